//! Evaluation tree: nodes, functions, and the call context.
//!
//! A [`Node`] owns its children and a [`Scope`] of variables and
//! user-declared functions copied from its parent when the tree is built.
//! Executing a node threads a single working value (`root`) through its
//! `init` → `parse` → children → convert → `final` lifecycle.
//!
//! A [`Function`] is an ordered list of [`CommandCall`]s.  Calling it binds
//! arguments to parameter names, then feeds `root` through each call in turn;
//! the value a command returns becomes the next command's root.
//!
//! Parameters form the call frame.  A lambda or nested call resolved while
//! a frame is live captures that frame by value, so `$param` inside it
//! still names the enclosing function's argument when it runs later.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::script::registry::Registry;
use crate::script::value::Value;
use crate::types::DataType;

// ── Call specs ────────────────────────────────────────────────────────────────

/// An unevaluated command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Literal(Value),
    /// `$name`, resolved when the call runs.
    Ref(String),
    /// A nested call or lambda.
    Func(Rc<Function>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandCall {
    pub name: String,
    pub args: Vec<Arg>,
    pub kwargs: Vec<(String, Arg)>,
}

impl CommandCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    pub params: Vec<String>,
    pub calls: Vec<CommandCall>,
    /// Bindings captured from the frame the function was resolved in.
    pub env: HashMap<String, Value>,
}

impl Function {
    pub fn new(params: Vec<String>, calls: Vec<CommandCall>) -> Self {
        Self {
            params,
            calls,
            env: HashMap::new(),
        }
    }

    /// Copy of this function that also sees `frame`; its own captures win.
    pub fn capture(&self, frame: &HashMap<String, Value>) -> Self {
        let mut env = frame.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            params: self.params.clone(),
            calls: self.calls.clone(),
            env,
        }
    }

    /// Map actual arguments onto parameter names.
    ///
    /// Positional arguments bind first, then keywords.  Parameters left
    /// unbound resolve to `Undefined`.  Captured bindings fill in the rest
    /// of the frame, shadowed by parameters.
    pub fn bind(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<HashMap<String, Value>> {
        let given = args.len() + kwargs.len();
        if given > self.params.len() {
            return Err(Error::binding(format!(
                "takes {} argument(s) but {given} were given",
                self.params.len()
            )));
        }
        let mut bound: HashMap<String, Value> = HashMap::with_capacity(self.params.len());
        for (name, value) in self.params.iter().zip(args) {
            bound.insert(name.clone(), value);
        }
        for (name, value) in kwargs {
            if !self.params.contains(&name) {
                return Err(Error::binding(format!("unexpected keyword argument `{name}`")));
            }
            if bound.contains_key(&name) {
                return Err(Error::binding(format!("argument `{name}` given twice")));
            }
            bound.insert(name, value);
        }
        for name in &self.params {
            bound.entry(name.clone()).or_insert(Value::Undefined);
        }
        if self.env.is_empty() {
            return Ok(bound);
        }
        let mut frame = self.env.clone();
        frame.extend(bound);
        Ok(frame)
    }
}

/// Evaluated arguments handed to a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>, keyword: Vec<(String, Value)>) -> Self {
        Self { positional, keyword }
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.positional.get(i)
    }

    pub fn kw(&self, name: &str) -> Option<&Value> {
        self.keyword.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Variables and user functions visible to a node.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub variables: HashMap<String, Value>,
    pub functions: HashMap<String, Rc<Function>>,
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything a running command can reach: the command table, settings, and
/// the scope of the node whose pipeline is executing.
pub struct Context<'a> {
    registry: &'a Registry,
    config: &'a Config,
    scope: &'a mut Scope,
    /// Bindings of the function currently running.
    frame: Rc<HashMap<String, Value>>,
    depth: usize,
}

impl<'a> Context<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config, scope: &'a mut Scope) -> Self {
        Self {
            registry,
            config,
            scope,
            frame: Rc::default(),
            depth: 0,
        }
    }

    fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Node variable, or `Undefined`.
    pub fn variable(&self, name: &str) -> Value {
        self.scope.variables.get(name).cloned().unwrap_or_default()
    }

    /// Parameter of the running function, else node variable, else
    /// `Undefined`.
    pub fn lookup(&self, name: &str) -> Value {
        match self.frame.get(name) {
            Some(v) => v.clone(),
            None => self.variable(name),
        }
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.scope.variables.insert(name.to_owned(), value);
    }

    /// Run `func` against `root` with the given arguments.
    pub fn call(
        &mut self,
        func: &Function,
        root: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value> {
        let bound = func.bind(args, kwargs)?;
        if self.depth >= self.config.max_depth {
            return Err(Error::RecursionLimit(self.config.max_depth));
        }
        self.depth += 1;
        let outer = std::mem::replace(&mut self.frame, Rc::new(bound));
        let result = self.run_calls(func, root);
        self.frame = outer;
        self.depth -= 1;
        result
    }

    fn run_calls(&mut self, func: &Function, mut root: Value) -> Result<Value> {
        for call in &func.calls {
            let args = call.args.iter().map(|a| self.resolve(a)).collect();
            let kwargs = call
                .kwargs
                .iter()
                .map(|(k, a)| (k.clone(), self.resolve(a)))
                .collect();
            root = self.invoke(&call.name, root, args, kwargs)?;
        }
        Ok(root)
    }

    fn resolve(&self, arg: &Arg) -> Value {
        match arg {
            Arg::Literal(v) => v.clone(),
            Arg::Ref(name) => self.lookup(name),
            Arg::Func(f) if self.frame.is_empty() => Value::Func(Rc::clone(f)),
            Arg::Func(f) => Value::Func(Rc::new(f.capture(&self.frame))),
        }
    }

    /// Invoke a command by name: node functions first, then the registry.
    pub fn invoke(
        &mut self,
        name: &str,
        root: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value> {
        trace!(command = name, args = args.len(), kwargs = kwargs.len(), "invoke");
        if let Some(func) = self.scope.functions.get(name).cloned() {
            return self.call(&func, root, args, kwargs);
        }
        let registry = self.registry;
        let command = registry
            .lookup(name)
            .ok_or_else(|| Error::CommandNotFound(name.to_owned()))?;
        let (args, kwargs) = if command.takes_callables() {
            (args, kwargs)
        } else {
            let mut forced = Vec::with_capacity(args.len());
            for a in args {
                forced.push(self.force(a, &root)?);
            }
            let mut forced_kw = Vec::with_capacity(kwargs.len());
            for (k, v) in kwargs {
                forced_kw.push((k, self.force(v, &root)?));
            }
            (forced, forced_kw)
        };
        command.run(self, root, Args::new(args, kwargs))
    }

    /// Evaluate a zero-parameter callable against `root`; other values pass.
    pub fn force(&mut self, value: Value, root: &Value) -> Result<Value> {
        match value {
            Value::Func(f) if f.params.is_empty() => self.call(&f, root.clone(), Vec::new(), Vec::new()),
            other => Ok(other),
        }
    }

    /// Apply a callable argument to `root`.
    ///
    /// A lambda's parameters are bound to `root` as well; a string names a
    /// command to run with no arguments.
    pub fn apply(&mut self, callable: &Value, root: Value) -> Result<Value> {
        match callable {
            Value::Func(f) => {
                let args = if f.params.is_empty() { Vec::new() } else { vec![root.clone()] };
                self.call(f, root, args, Vec::new())
            }
            Value::Str(name) => self.invoke(name, root, Vec::new(), Vec::new()),
            other => Err(Error::command(
                "apply",
                format!("{} is not callable", other.type_name()),
            )),
        }
    }

    /// Evaluate an inline template against `root`.
    ///
    /// A mapping yields an object; a line or list of lines runs as a
    /// pipeline.
    pub fn render_template(&mut self, template: &Value, root: Value) -> Result<Value> {
        if self.depth >= self.config.max_depth {
            return Err(Error::RecursionLimit(self.config.max_depth));
        }
        let mut node = crate::template::build_root(template, self.scope)?;
        node.root = root;
        node.execute_at(self.registry, self.config, self.depth + 1)
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub dtype: DataType,
    pub root: Value,
    /// Has typed children: output collects their results.
    pub object: bool,
    pub children: Vec<Node>,
    pub scope: Scope,
    pub init: Rc<Function>,
    pub parse: Rc<Function>,
    pub finalize: Rc<Function>,
}

impl Node {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
            root: Value::Undefined,
            object: false,
            children: Vec::new(),
            scope: Scope::default(),
            init: Rc::default(),
            parse: Rc::default(),
            finalize: Rc::default(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Run the node and return its converted value.
    pub fn execute(&mut self, registry: &Registry, config: &Config) -> Result<Value> {
        self.execute_at(registry, config, 0)
    }

    pub(crate) fn execute_at(&mut self, registry: &Registry, config: &Config, depth: usize) -> Result<Value> {
        debug!(node = %self.name, dtype = %self.dtype, "execute");
        let init = Rc::clone(&self.init);
        self.run_hook(&init, registry, config, depth)?;

        if self.object {
            for child in &mut self.children {
                child.root = self.root.clone();
            }
        }

        let parse = Rc::clone(&self.parse);
        self.run_hook(&parse, registry, config, depth)?;

        let raw = if self.object {
            let mut pairs = Vec::with_capacity(self.children.len());
            for child in &mut self.children {
                let value = child
                    .execute_at(registry, config, depth)
                    .map_err(|e| e.in_node(&child.name))?;
                pairs.push((Value::Str(child.name.clone()), value));
            }
            Value::Map(pairs)
        } else {
            self.root.clone()
        };
        let result = self.dtype.convert(raw)?;

        let finalize = Rc::clone(&self.finalize);
        self.run_hook(&finalize, registry, config, depth)?;
        debug!(node = %self.name, result = result.type_name(), "done");
        Ok(result)
    }

    fn run_hook(&mut self, func: &Function, registry: &Registry, config: &Config, depth: usize) -> Result<()> {
        if func.calls.is_empty() {
            return Ok(());
        }
        let root = std::mem::take(&mut self.root);
        let mut ctx = Context::new(registry, config, &mut self.scope).at_depth(depth);
        self.root = ctx.call(func, root, Vec::new(), Vec::new())?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
