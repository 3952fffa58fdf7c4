//! Template construction.
//!
//! A template is a mapping whose keys are classified by
//! [`classify_key`](crate::script::grammar::classify_key):
//!
//! ```yaml
//! $base: "https://example.com"
//! link(sel): [select_one($sel), attr(href), "concat_str(pre, '', $base)"]
//! String title: [select_one(h1), text, strip]
//! List[Integer] counts: [select(li), foreach(inner_text)]
//! Object author:
//!   init(): [select_one(.author)]
//!   String name: [text]
//! ```
//!
//! Construction copies the parent's variables and functions into each child
//! before the child's own declarations are applied, so every node owns an
//! independent scope.
//!
//! A variable declared with a mapping is itself an object template.  It is
//! checked here and evaluated against the root of whichever node refers to
//! it.

use std::rc::Rc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::script::grammar::{classify_key, parse_body, KeyForm};
use crate::script::node::{Arg, CommandCall, Function, Node, Scope};
use crate::script::value::Value;
use crate::types::DataType;

/// A parsed template, reusable across documents.
#[derive(Debug, Clone)]
pub struct Template {
    root: Node,
}

impl Template {
    pub fn from_yaml_str(src: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(src)?;
        Self::from_value(&Value::from(doc))
    }

    pub fn from_json_str(src: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(src)?;
        Self::from_value(&Value::from(doc))
    }

    /// Build from an already-decoded mapping.
    pub fn from_value(decl: &Value) -> Result<Self> {
        if !matches!(decl, Value::Map(_)) {
            return Err(Error::parse(format!(
                "a template must be a mapping, got {}",
                decl.type_name()
            )));
        }
        let root = build_root(decl, &Scope::default())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// A fresh copy of the node tree for one run.
    pub fn instantiate(&self) -> Node {
        self.root.clone()
    }
}

/// Build a top-level or inline template.  Mappings always produce objects.
pub(crate) fn build_root(decl: &Value, inherited: &Scope) -> Result<Node> {
    match decl {
        Value::Map(_) => {
            let mut node = build_node("", DataType::Object, decl, inherited)?;
            node.object = true;
            Ok(node)
        }
        other => build_node("", DataType::Any, other, inherited),
    }
}

/// A mapping-valued variable: a zero-parameter callable that renders the
/// mapping as an inline template.
fn object_variable(decl: &Value, scope: &Scope) -> Result<Value> {
    build_root(decl, scope)?;
    let mut apply = CommandCall::new("apply");
    apply.kwargs.push(("template".to_owned(), Arg::Literal(decl.clone())));
    Ok(Value::Func(Rc::new(Function::new(Vec::new(), vec![apply]))))
}

pub(crate) fn build_node(name: &str, dtype: DataType, decl: &Value, inherited: &Scope) -> Result<Node> {
    let mut node = Node::new(name, dtype);
    node.scope = inherited.clone();
    match decl {
        Value::Map(pairs) => {
            let mut entries: Vec<(String, DataType, &Value)> = Vec::new();
            for (key, value) in pairs {
                let Value::Str(key) = key else {
                    return Err(Error::parse(format!(
                        "template keys must be strings, got {}",
                        key.type_name()
                    )));
                };
                match classify_key(key)? {
                    KeyForm::Variable(var) => {
                        let value = match value {
                            Value::Map(_) => object_variable(value, &node.scope)
                                .map_err(|e| e.in_node(&format!("${var}")))?,
                            other => other.clone(),
                        };
                        node.scope.variables.insert(var, value);
                    }
                    KeyForm::Function { name: fname, params } => {
                        let func = Rc::new(parse_body(params, value).map_err(|e| e.in_node(&fname))?);
                        let slot = match fname.as_str() {
                            "init" => Some(&mut node.init),
                            "parse" => Some(&mut node.parse),
                            "final" => Some(&mut node.finalize),
                            _ => None,
                        };
                        match slot {
                            Some(slot) => {
                                if !slot.calls.is_empty() {
                                    warn!(node = name, hook = %fname, "hook declared twice; earlier body ignored");
                                }
                                *slot = func;
                            }
                            None => {
                                node.scope.functions.insert(fname, func);
                            }
                        }
                    }
                    KeyForm::Entry { dtype, name: entry } => {
                        if entries.iter().any(|(n, _, _)| *n == entry) {
                            return Err(Error::parse(format!("duplicate entry `{entry}`")));
                        }
                        entries.push((entry, dtype, value));
                    }
                }
            }
            if !entries.is_empty() && !node.dtype.is_map_like() {
                return Err(Error::parse(format!(
                    "{} cannot have typed children",
                    node.dtype
                )));
            }
            node.object = !entries.is_empty();
            for (entry, dtype, value) in entries {
                let child = build_node(&entry, dtype, value, &node.scope).map_err(|e| e.in_node(&entry))?;
                node.children.push(child);
            }
        }
        Value::List(_) | Value::Str(_) => {
            node.parse = Rc::new(parse_body(Vec::new(), decl)?);
        }
        Value::Null => {}
        other => {
            return Err(Error::parse(format!(
                "an entry must be a mapping, a line, or a list of lines, got {}",
                other.type_name()
            )))
        }
    }
    Ok(node)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
