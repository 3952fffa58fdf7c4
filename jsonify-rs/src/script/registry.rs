//! Named command table.
//!
//! Commands are plain closures over `(context, root, args)`.  A command
//! registered as higher-order receives callable arguments unevaluated so it
//! can run them per item; ordinary commands see them already applied to the
//! current root.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::script::node::{Args, Context};
use crate::script::value::Value;

pub type CommandFn = Rc<dyn Fn(&mut Context<'_>, Value, Args) -> Result<Value>>;

#[derive(Clone)]
pub struct Command {
    run: CommandFn,
    higher_order: bool,
}

impl Command {
    pub fn run(&self, ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
        (self.run)(ctx, root, args)
    }

    /// Whether callable arguments are passed through unevaluated.
    pub fn takes_callables(&self) -> bool {
        self.higher_order
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("higher_order", &self.higher_order)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: HashMap<String, Command>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in command set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtins::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) an ordinary command.
    pub fn register<F>(&mut self, name: &str, run: F)
    where
        F: Fn(&mut Context<'_>, Value, Args) -> Result<Value> + 'static,
    {
        self.insert(name, Rc::new(run), false);
    }

    /// Register a command that receives callables unevaluated.
    pub fn register_higher_order<F>(&mut self, name: &str, run: F)
    where
        F: Fn(&mut Context<'_>, Value, Args) -> Result<Value> + 'static,
    {
        self.insert(name, Rc::new(run), true);
    }

    fn insert(&mut self, name: &str, run: CommandFn, higher_order: bool) {
        let previous = self
            .commands
            .insert(name.to_owned(), Command { run, higher_order });
        if previous.is_some() {
            debug!(command = name, "command replaced");
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
