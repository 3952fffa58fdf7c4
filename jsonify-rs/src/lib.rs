//! Template-driven HTML to JSON extraction.
//!
//! A template declares typed output fields, each computed by a pipeline of
//! commands run against the parsed document:
//!
//! ```rust
//! use jsonify::{Engine, Template};
//!
//! let template = Template::from_yaml_str(r#"
//! String title: [select_one(h1), text]
//! List[Integer] ids: [select(li), foreach(text)]
//! "#)?;
//! let html = "<div><h1>News</h1><ul><li>1</li><li>2</li></ul></div>";
//! let out = Engine::new().render_json(&template, html)?;
//! assert_eq!(out["title"], "News");
//! assert_eq!(out["ids"], serde_json::json!([1, 2]));
//! # Ok::<(), jsonify::Error>(())
//! ```

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod script;
pub mod selector;
pub mod template;
pub mod types;

pub use config::Config;
pub use dom::Element;
pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use script::{Registry, Value};
pub use template::Template;
pub use types::DataType;
