//! Rendering entry points.

use tracing::debug;

use crate::config::Config;
use crate::dom::{self, Element};
use crate::error::Result;
use crate::script::registry::Registry;
use crate::script::value::Value;
use crate::template::Template;

/// A command registry plus settings.  Templates are rendered against it.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Registry,
    config: Config,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Built-in commands and default settings.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_registry(Registry::with_builtins(), config)
    }

    pub fn with_registry(registry: Registry, config: Config) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// For registering or overriding commands.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse `html` and render `template` against it.
    pub fn render(&self, template: &Template, html: &str) -> Result<Value> {
        self.render_element(template, dom::parse_html(html))
    }

    pub fn render_element(&self, template: &Template, root: Element) -> Result<Value> {
        self.render_value(template, Value::from(root))
    }

    /// Render with an arbitrary starting value.
    pub fn render_value(&self, template: &Template, root: Value) -> Result<Value> {
        let mut node = template.instantiate();
        node.root = root;
        debug!(entries = node.children.len(), "render");
        node.execute(&self.registry, &self.config)
    }

    pub fn render_json(&self, template: &Template, html: &str) -> Result<serde_json::Value> {
        self.render(template, html).map(|v| v.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn renders_fields_in_declaration_order() {
        let t = Template::from_yaml_str(
            r#"
String title: [select_one(h1), text]
Integer count: [select(li), len]
"#,
        )
        .unwrap();
        let out = Engine::new()
            .render_json(&t, "<div><h1>T</h1><ul><li>a</li><li>b</li></ul></div>")
            .unwrap();
        assert_eq!(out.to_string(), r#"{"title":"T","count":2}"#);
    }

    #[test]
    fn templates_are_reusable() {
        let t = Template::from_yaml_str("String x: [text, set(seen)]").unwrap();
        let engine = Engine::new();
        assert_eq!(engine.render_json(&t, "<p>a</p>").unwrap()["x"], "a");
        assert_eq!(engine.render_json(&t, "<p>b</p>").unwrap()["x"], "b");
        assert!(!t.root().child("x").unwrap().scope.variables.contains_key("seen"));
    }

    #[test]
    fn user_commands_override_builtins() {
        let mut engine = Engine::new();
        engine
            .registry_mut()
            .register("text", |_ctx, _root, _args| Ok(Value::from("overridden")));
        let t = Template::from_yaml_str("String x: [text]").unwrap();
        assert_eq!(engine.render_json(&t, "<p>a</p>").unwrap()["x"], "overridden");
    }

    #[test]
    fn depth_limit_from_config() {
        let config = Config::from_yaml_str("max_depth: 4").unwrap();
        let engine = Engine::with_config(config);
        let t = Template::from_yaml_str("again(): [again]\nString x: [again]\n").unwrap();
        let err = engine.render(&t, "<p></p>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecursionLimit);
        assert_eq!(err.path(), Some("x"));
    }
}
