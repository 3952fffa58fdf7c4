//! Template scripting: values, command lines, and their evaluation.
//!
//! - [`grammar`] turns template keys and command lines into [`node`] specs
//! - [`registry`] maps command names to implementations; [`builtins`] fills it
//! - [`node`] runs pipelines and walks the evaluation tree
//! - [`expr`] is the small expression language behind `eval`
//!
//! # Quick start
//!
//! ```rust
//! use jsonify::config::Config;
//! use jsonify::script::{grammar, Context, Registry, Scope, Value};
//!
//! let registry = Registry::with_builtins();
//! let config = Config::default();
//! let mut scope = Scope::default();
//! let mut ctx = Context::new(&registry, &config, &mut scope);
//!
//! let pipeline = grammar::parse_body(vec![], &Value::from("split(\",\")")).unwrap();
//! let out = ctx.call(&pipeline, Value::from("a,b"), vec![], vec![]).unwrap();
//! assert_eq!(out, Value::List(vec![Value::from("a"), Value::from("b")]));
//! ```

pub mod builtins;
pub mod expr;
pub mod grammar;
pub mod node;
pub mod registry;
pub mod value;

pub use expr::EvalContext;
pub use node::{Args, Context, Function, Node, Scope};
pub use registry::Registry;
pub use value::Value;
