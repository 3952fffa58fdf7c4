//! Runtime value type flowing through command pipelines.
//!
//! Pipelines are dynamically typed.  A value starts life as a parsed HTML
//! element, gets narrowed by selectors and string commands, and is finally
//! coerced by the entry's declared [`DataType`](crate::types::DataType).

use std::fmt;
use std::rc::Rc;

use crate::dom::Element;
use crate::script::node::Function;

/// A pipeline runtime value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Reference to a name that was never bound.  Distinct from [`Value::Null`].
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered key/value pairs; keys are unique.
    Map(Vec<(Value, Value)>),
    /// Shared tree; mutating commands copy it first.
    Element(Rc<Element>),
    Func(Rc<Function>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined | Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
            Value::Element(el) => f.write_str(&el.text_content()),
            Value::Func(func) => write!(f, "<function/{}>", func.params.len()),
        }
    }
}

impl Value {
    /// Name of the runtime type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Element(_) => "element",
            Value::Func(_) => "function",
        }
    }

    /// `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Truthiness: empty strings, empty collections, zero, and nullish values are false.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(pairs) => !pairs.is_empty(),
            Value::Element(_) | Value::Func(_) => true,
        }
    }

    /// Loose integer view used for command arguments such as indices.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Bool(b) => Some(i128::from(*b)),
            Value::Int(n) => Some(*n),
            Value::Float(x) if x.is_finite() => Some(*x as i128),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce to a string; nullish values become empty.
    pub fn as_str(&self) -> String {
        self.to_string()
    }

    /// Items produced by iterating this value.
    ///
    /// Lists yield their items, maps their keys, strings their characters,
    /// elements their child elements; nullish values yield nothing.
    pub fn items(&self) -> Result<Vec<Value>, String> {
        match self {
            Value::Undefined | Value::Null => Ok(Vec::new()),
            Value::List(items) => Ok(items.clone()),
            Value::Map(pairs) => Ok(pairs.iter().map(|(k, _)| k.clone()).collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Element(el) => Ok(el
                .child_elements()
                .map(|child| Value::Element(Rc::clone(child)))
                .collect()),
            other => Err(format!("{} is not iterable", other.type_name())),
        }
    }

    /// Look up a string key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| matches!(k, Value::Str(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert into an ordered pair list; a repeated key keeps its first
    /// position and takes the last value.
    pub fn map_insert(pairs: &mut Vec<(Value, Value)>, key: Value, value: Value) {
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => pairs.push((key, value)),
        }
    }

    /// Convert to JSON for output.  Elements serialize as HTML text.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Undefined | Value::Null | Value::Func(_) => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(n) => {
                if let Ok(i) = i64::try_from(*n) {
                    J::from(i)
                } else if let Ok(u) = u64::try_from(*n) {
                    J::from(u)
                } else {
                    J::String(n.to_string())
                }
            }
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Str(s) => J::String(s.clone()),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(pairs) => J::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Value::Element(el) => J::String(el.to_html()),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(i128::from(n))
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Element> for Value {
    fn from(el: Element) -> Self {
        Value::Element(Rc::new(el))
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(v: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Y;
        match v {
            Y::Null => Value::Null,
            Y::Bool(b) => Value::Bool(b),
            Y::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Int(i128::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Y::String(s) => Value::Str(s),
            Y::Sequence(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Y::Mapping(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::from(k), Value::from(v)))
                    .collect(),
            ),
            Y::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Int(i128::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            J::String(s) => Value::Str(s),
            J::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            J::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Undefined.to_string(), "");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn display_collections_as_json() {
        let v = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(v.to_string(), r#"[1,"a"]"#);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.as_bool());
        assert!(!Value::Str(String::new()).as_bool());
        assert!(Value::from("0").as_bool());
        assert!(!Value::List(vec![]).as_bool());
        assert!(Value::Int(-1).as_bool());
    }

    #[test]
    fn undefined_is_distinct_from_null() {
        assert_ne!(Value::Undefined, Value::Null);
        assert!(Value::Undefined.is_nullish());
        assert!(Value::Null.is_nullish());
    }

    #[test]
    fn items_of_map_are_keys() {
        let mut pairs = Vec::new();
        Value::map_insert(&mut pairs, "a".into(), Value::Int(1));
        Value::map_insert(&mut pairs, "b".into(), Value::Int(2));
        let items = Value::Map(pairs).items().unwrap();
        assert_eq!(items, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn map_insert_last_write_wins_in_place() {
        let mut pairs = Vec::new();
        Value::map_insert(&mut pairs, "a".into(), Value::Int(1));
        Value::map_insert(&mut pairs, "b".into(), Value::Int(2));
        Value::map_insert(&mut pairs, "a".into(), Value::Int(3));
        assert_eq!(
            pairs,
            vec![
                (Value::from("a"), Value::Int(3)),
                (Value::from("b"), Value::Int(2)),
            ]
        );
    }

    #[test]
    fn integers_not_iterable() {
        assert!(Value::Int(3).items().is_err());
    }

    #[test]
    fn json_preserves_map_order() {
        let v = Value::Map(vec![
            (Value::from("z"), Value::Int(1)),
            (Value::from("a"), Value::Int(2)),
        ]);
        assert_eq!(v.to_json().to_string(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn yaml_lowering() {
        let doc: serde_yaml::Value = serde_yaml::from_str("[1, x, {k: true}, ~]").unwrap();
        let v = Value::from(doc);
        assert_eq!(
            v,
            Value::List(vec![
                Value::Int(1),
                Value::from("x"),
                Value::Map(vec![(Value::from("k"), Value::Bool(true))]),
                Value::Null,
            ])
        );
    }

    #[test]
    fn huge_ints_serialize_as_strings() {
        let big = Value::Int(i128::MAX);
        assert_eq!(big.to_json(), serde_json::Value::String(i128::MAX.to_string()));
    }
}
