//! Declared entry types and value conversion.
//!
//! | Name | Result |
//! |------|--------|
//! | `String`, `Html` | text / serialized markup |
//! | `Integer`, `Int8` … `Int64`, `Int128`, `UInt8` … `UInt64` | integer, wrapped to width |
//! | `Float`, `Float16`, `Float32`, `Float64` | float, rounded to width |
//! | `Boolean`, `DateTime`, `Any` | |
//! | `List[T]`, `Set[T]`, `Tuple[A, B, …]` | lists |
//! | `Map[K, V]`, `Object` | ordered maps (bare `Map` is `Map[String, Any]`) |
//!
//! Every conversion is idempotent: converting an already-converted value
//! to the same type returns it unchanged.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::script::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Any,
    String,
    Html,
    Boolean,
    /// Arbitrary-precision integer (bounded by `i128` in practice).
    Integer,
    Fixed { bits: u32, signed: bool },
    Float,
    Float16,
    Float32,
    Float64,
    DateTime,
    List(Box<DataType>),
    Set(Box<DataType>),
    Tuple(Vec<DataType>),
    Map(Box<DataType>, Box<DataType>),
    Object,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Any => f.write_str("Any"),
            DataType::String => f.write_str("String"),
            DataType::Html => f.write_str("Html"),
            DataType::Boolean => f.write_str("Boolean"),
            DataType::Integer => f.write_str("Integer"),
            DataType::Fixed { bits, signed: true } => write!(f, "Int{bits}"),
            DataType::Fixed { bits, signed: false } => write!(f, "UInt{bits}"),
            DataType::Float => f.write_str("Float"),
            DataType::Float16 => f.write_str("Float16"),
            DataType::Float32 => f.write_str("Float32"),
            DataType::Float64 => f.write_str("Float64"),
            DataType::DateTime => f.write_str("DateTime"),
            DataType::List(t) => write!(f, "List[{t}]"),
            DataType::Set(t) => write!(f, "Set[{t}]"),
            DataType::Tuple(ts) => {
                f.write_str("Tuple[")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{t}")?;
                }
                f.write_str("]")
            }
            DataType::Map(k, v) => write!(f, "Map[{k}, {v}]"),
            DataType::Object => f.write_str("Object"),
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

struct TypeParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn skip_ws(&mut self) {
        while self.src[self.pos..].starts_with(char::is_whitespace) {
            self.pos += self.src[self.pos..].chars().next().map_or(1, char::len_utf8);
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(Error::parse(format!("expected a type name in `{}`", self.src)));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn parse_type(&mut self) -> Result<DataType> {
        let name = self.ident()?;
        let mut params = Vec::new();
        if self.eat('[') {
            if !self.eat(']') {
                loop {
                    params.push(self.parse_type()?);
                    if self.eat(']') {
                        break;
                    }
                    if !self.eat(',') {
                        return Err(Error::parse(format!("expected `,` or `]` in `{}`", self.src)));
                    }
                }
            }
        }
        resolve(name, params, self.src)
    }
}

fn resolve(name: &str, mut params: Vec<DataType>, src: &str) -> Result<DataType> {
    let arity = |max: usize, params: &[DataType]| -> Result<()> {
        if params.len() > max {
            Err(Error::parse(format!("`{name}` takes at most {max} type parameter(s) in `{src}`")))
        } else {
            Ok(())
        }
    };
    let scalar = match name {
        "Any" => Some(DataType::Any),
        "String" | "Str" | "Text" | "str" => Some(DataType::String),
        "Html" | "html" => Some(DataType::Html),
        "Boolean" | "Bool" | "bool" => Some(DataType::Boolean),
        "Integer" | "Int" | "BigInt" | "int" => Some(DataType::Integer),
        "Int8" | "Char" => Some(DataType::Fixed { bits: 8, signed: true }),
        "Int16" => Some(DataType::Fixed { bits: 16, signed: true }),
        "Int32" => Some(DataType::Fixed { bits: 32, signed: true }),
        "Int64" => Some(DataType::Fixed { bits: 64, signed: true }),
        "Int128" => Some(DataType::Fixed { bits: 128, signed: true }),
        "UInt8" | "UChar" => Some(DataType::Fixed { bits: 8, signed: false }),
        "UInt16" => Some(DataType::Fixed { bits: 16, signed: false }),
        "UInt32" => Some(DataType::Fixed { bits: 32, signed: false }),
        "UInt64" => Some(DataType::Fixed { bits: 64, signed: false }),
        "Float" | "Double" | "float" => Some(DataType::Float),
        "Float16" => Some(DataType::Float16),
        "Float32" => Some(DataType::Float32),
        "Float64" => Some(DataType::Float64),
        "DateTime" | "Date" | "Time" | "datetime" => Some(DataType::DateTime),
        "Object" | "Obj" | "object" | "obj" => Some(DataType::Object),
        _ => None,
    };
    if let Some(t) = scalar {
        arity(0, &params)?;
        return Ok(t);
    }
    match name {
        "List" | "list" | "Set" | "set" => {
            arity(1, &params)?;
            let item = Box::new(params.pop().unwrap_or(DataType::Any));
            Ok(if name.eq_ignore_ascii_case("list") {
                DataType::List(item)
            } else {
                DataType::Set(item)
            })
        }
        "Tuple" => Ok(DataType::Tuple(params)),
        "Map" | "Dict" | "Dictionary" | "Mapping" | "HashTable" | "dict" => match params.len() {
            0 => Ok(DataType::Map(Box::new(DataType::String), Box::new(DataType::Any))),
            2 => {
                let v = params.pop().unwrap_or(DataType::Any);
                let k = params.pop().unwrap_or(DataType::Any);
                Ok(DataType::Map(Box::new(k), Box::new(v)))
            }
            _ => Err(Error::parse(format!("`{name}` takes 0 or 2 type parameters in `{src}`"))),
        },
        _ => Err(Error::parse(format!("unknown type `{name}` in `{src}`"))),
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl DataType {
    /// Parse a type name such as `List[Map[String, Int32]]`.
    pub fn parse(src: &str) -> Result<Self> {
        let mut p = TypeParser { src, pos: 0 };
        let t = p.parse_type()?;
        p.skip_ws();
        if p.pos != src.len() {
            return Err(Error::parse(format!("trailing input after type in `{src}`")));
        }
        Ok(t)
    }

    /// Types whose values are key/value collections.
    pub fn is_map_like(&self) -> bool {
        matches!(self, DataType::Map(..) | DataType::Object)
    }

    /// Coerce `value` into this type.
    ///
    /// `Undefined` and `Null` map to the type's empty value (`""`, `0`,
    /// `false`, `[]`, `{}`, the epoch); `Any` leaves them alone.
    pub fn convert(&self, value: Value) -> Result<Value> {
        if value.is_nullish() {
            return Ok(match self {
                DataType::Any => value,
                _ => self.empty(),
            });
        }
        match self {
            DataType::Any => Ok(value),
            DataType::Object => self.convert_map(&DataType::String, &DataType::Any, value),
            DataType::Map(k, v) => self.convert_map(k, v, value),
            DataType::List(t) => self.collect_items(value).and_then(|items| {
                items.into_iter().map(|i| t.convert(i)).collect::<Result<Vec<_>>>().map(Value::List)
            }),
            DataType::Set(t) => {
                let mut out: Vec<Value> = Vec::new();
                for item in self.collect_items(value)? {
                    let item = t.convert(item)?;
                    if !out.contains(&item) {
                        out.push(item);
                    }
                }
                Ok(Value::List(out))
            }
            DataType::Tuple(ts) => {
                let items = self.collect_items(value)?;
                ts.iter()
                    .zip(items)
                    .map(|(t, item)| t.convert(item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            DataType::String => Ok(Value::Str(match value {
                Value::Element(el) => el.text_content(),
                other => other.to_string(),
            })),
            DataType::Html => Ok(Value::Str(match value {
                Value::Element(el) => el.to_html(),
                other => other.to_string(),
            })),
            DataType::Boolean => Ok(Value::Bool(match value {
                Value::Element(_) => true,
                other => other.as_bool(),
            })),
            DataType::Integer => self.to_int(&value).map(Value::Int),
            DataType::Fixed { bits, signed } => {
                self.to_int(&value).map(|n| Value::Int(wrap(n, *bits, *signed)))
            }
            DataType::Float | DataType::Float64 => self.to_float(&value).map(Value::Float),
            DataType::Float32 => self.to_float(&value).map(|x| Value::Float(f64::from(x as f32))),
            DataType::Float16 => self.to_float(&value).map(|x| Value::Float(round_f16(x))),
            DataType::DateTime => self.to_datetime(&value).map(Value::Str),
        }
    }

    fn empty(&self) -> Value {
        match self {
            DataType::Any => Value::Undefined,
            DataType::String | DataType::Html => Value::Str(String::new()),
            DataType::Boolean => Value::Bool(false),
            DataType::Integer | DataType::Fixed { .. } => Value::Int(0),
            DataType::Float | DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                Value::Float(0.0)
            }
            DataType::DateTime => Value::Str("1970-01-01T00:00:00".to_owned()),
            DataType::List(_) | DataType::Set(_) | DataType::Tuple(_) => Value::List(Vec::new()),
            DataType::Map(..) | DataType::Object => Value::Map(Vec::new()),
        }
    }

    fn error(&self, value: &Value) -> Error {
        let mut shown = value.to_string();
        if shown.chars().count() > 40 {
            shown = shown.chars().take(40).collect::<String>() + "…";
        }
        Error::TypeConversion {
            target: self.to_string(),
            value: format!("{} `{shown}`", value.type_name()),
        }
    }

    fn collect_items(&self, value: Value) -> Result<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items),
            other => other.items().map_err(|_| self.error(&other)),
        }
    }

    fn convert_map(&self, k: &DataType, v: &DataType, value: Value) -> Result<Value> {
        let pairs: Vec<(Value, Value)> = match value {
            Value::Map(pairs) => pairs,
            Value::Element(el) => el
                .attrs
                .iter()
                .map(|(name, val)| (Value::Str(name.clone()), Value::Str(val.clone())))
                .collect(),
            Value::List(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::List(mut kv) if kv.len() == 2 => {
                            let val = kv.pop().unwrap_or_default();
                            let key = kv.pop().unwrap_or_default();
                            pairs.push((key, val));
                        }
                        other => return Err(self.error(&other)),
                    }
                }
                pairs
            }
            other => return Err(self.error(&other)),
        };
        let mut out = Vec::with_capacity(pairs.len());
        for (key, val) in pairs {
            Value::map_insert(&mut out, k.convert(key)?, v.convert(val)?);
        }
        Ok(Value::Map(out))
    }

    fn to_int(&self, value: &Value) -> Result<i128> {
        match value {
            Value::Int(n) => Ok(*n),
            Value::Bool(b) => Ok(i128::from(*b)),
            Value::Float(x) if x.is_finite() => Ok(x.trunc() as i128),
            Value::Str(s) => parse_int(s).ok_or_else(|| self.error(value)),
            Value::Element(el) => parse_int(&el.text_content()).ok_or_else(|| self.error(value)),
            _ => Err(self.error(value)),
        }
    }

    fn to_float(&self, value: &Value) -> Result<f64> {
        match value {
            Value::Float(x) => Ok(*x),
            Value::Int(n) => Ok(*n as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => parse_float(s).ok_or_else(|| self.error(value)),
            Value::Element(el) => parse_float(&el.text_content()).ok_or_else(|| self.error(value)),
            _ => Err(self.error(value)),
        }
    }

    fn to_datetime(&self, value: &Value) -> Result<String> {
        match value {
            Value::Int(secs) => i64::try_from(*secs)
                .ok()
                .and_then(|s| DateTime::from_timestamp(s, 0))
                .map(|dt| dt.naive_utc().format(NAIVE_OUT).to_string())
                .ok_or_else(|| self.error(value)),
            Value::Str(s) => parse_datetime(s).ok_or_else(|| self.error(value)),
            Value::Element(el) => parse_datetime(&el.text_content()).ok_or_else(|| self.error(value)),
            _ => Err(self.error(value)),
        }
    }
}

/// Reduce `n` modulo 2^bits into the signed or unsigned range.
pub fn wrap(n: i128, bits: u32, signed: bool) -> i128 {
    if bits >= 128 {
        return n;
    }
    let modulus = 1u128 << bits;
    let raw = (n as u128) & (modulus - 1);
    if signed && raw >= modulus >> 1 {
        raw as i128 - modulus as i128
    } else {
        raw as i128
    }
}

/// Integer literal with an optional sign and `0x` / `0o` / `0b` prefix.
fn parse_int(s: &str) -> Option<i128> {
    let t = s.trim();
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let body: String = body.chars().filter(|&c| c != '_').collect();
    let (radix, digits) = if let Some(d) = body.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = body.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = body.strip_prefix("0b") {
        (2, d)
    } else {
        (10, body.as_str())
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = u128::from_str_radix(digits, radix).ok()?;
    if negative {
        if magnitude == 1u128 << 127 {
            Some(i128::MIN)
        } else {
            i128::try_from(magnitude).ok().map(|m| -m)
        }
    } else {
        i128::try_from(magnitude).ok()
    }
}

fn parse_float(s: &str) -> Option<f64> {
    let t = s.trim();
    match t.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => t.parse().ok(),
    }
}

// ── Float16 ───────────────────────────────────────────────────────────────────

/// Round to the nearest IEEE binary16 value (ties to even).
pub fn round_f16(x: f64) -> f64 {
    f16_to_f64(f64_to_f16(x))
}

fn f64_to_f16(x: f64) -> u16 {
    let bits = x.to_bits();
    let sign = ((bits >> 48) & 0x8000) as u16;
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let man = bits & 0x000f_ffff_ffff_ffff;

    if exp == 0x7ff {
        return sign | if man == 0 { 0x7c00 } else { 0x7e00 };
    }
    let e = exp - 1023 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    if e >= 1 {
        let half_man = man >> 42;
        let rest = man & ((1u64 << 42) - 1);
        let halfway = 1u64 << 41;
        let mut out = ((e as u64) << 10) | half_man;
        if rest > halfway || (rest == halfway && half_man & 1 == 1) {
            out += 1;
        }
        return sign | out as u16;
    }
    // Subnormal half: value = m · 2^-24.
    let shift = (1051 - exp) as u32;
    if shift > 63 {
        return sign;
    }
    let full = man | (1u64 << 52);
    let half_man = full >> shift;
    let rest = full & ((1u64 << shift) - 1);
    let halfway = 1u64 << (shift - 1);
    let mut out = half_man;
    if rest > halfway || (rest == halfway && half_man & 1 == 1) {
        out += 1;
    }
    sign | out as u16
}

fn f16_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = i32::from((bits >> 10) & 0x1f);
    let man = f64::from(bits & 0x3ff);
    match exp {
        0 => sign * man * 2f64.powi(-24),
        0x1f if man == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN,
        _ => sign * (1.0 + man / 1024.0) * 2f64.powi(exp - 15),
    }
}

// ── DateTime ──────────────────────────────────────────────────────────────────

const NAIVE_OUT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const OFFSET_OUT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y",
];

/// Normalize a date/time string to ISO-8601.
fn parse_datetime(s: &str) -> Option<String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.format(OFFSET_OUT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(dt.format(OFFSET_OUT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.format(OFFSET_OUT).to_string());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.format(NAIVE_OUT).to_string());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.format(NAIVE_OUT).to_string());
        }
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    fn t(src: &str) -> DataType {
        DataType::parse(src).unwrap()
    }

    fn conv(ty: &str, v: Value) -> Value {
        t(ty).convert(v).unwrap()
    }

    #[test]
    fn parses_nested_types() {
        assert_eq!(
            t("List[Map[String, Int32]]"),
            DataType::List(Box::new(DataType::Map(
                Box::new(DataType::String),
                Box::new(DataType::Fixed { bits: 32, signed: true })
            )))
        );
        assert_eq!(t("List"), DataType::List(Box::new(DataType::Any)));
        assert_eq!(t("Tuple[Integer, String]").to_string(), "Tuple[Integer, String]");
    }

    #[test]
    fn rejects_bad_types() {
        assert!(DataType::parse("Nope").is_err());
        assert!(DataType::parse("List[String").is_err());
        assert!(DataType::parse("String[Integer]").is_err());
        assert!(DataType::parse("Map[String]").is_err());
    }

    #[test]
    fn widths_beyond_i128_are_unknown_types() {
        for name in ["UInt128", "Int256", "UInt256"] {
            let err = DataType::parse(name).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Parse, "{name}");
        }
        assert_eq!(conv("Int128", Value::Int(i128::MIN)), Value::Int(i128::MIN));
    }

    #[test]
    fn undefined_maps_to_empty_values() {
        assert_eq!(conv("String", Value::Undefined), Value::from(""));
        assert_eq!(conv("Integer", Value::Undefined), Value::Int(0));
        assert_eq!(conv("Boolean", Value::Undefined), Value::Bool(false));
        assert_eq!(conv("List[String]", Value::Undefined), Value::List(vec![]));
        assert_eq!(conv("Object", Value::Undefined), Value::Map(vec![]));
        assert_eq!(conv("DateTime", Value::Undefined), Value::from("1970-01-01T00:00:00"));
    }

    #[test]
    fn null_maps_like_undefined() {
        assert_eq!(conv("String", Value::Null), Value::from(""));
        assert_eq!(conv("Any", Value::Null), Value::Null);
        assert_eq!(conv("List[String]", Value::Null), Value::List(vec![]));
    }

    #[test]
    fn integer_prefixes() {
        assert_eq!(conv("Integer", "0x1F".into()), Value::Int(31));
        assert_eq!(conv("Integer", "0o17".into()), Value::Int(15));
        assert_eq!(conv("Integer", "0b101".into()), Value::Int(5));
        assert_eq!(conv("Integer", " -42 ".into()), Value::Int(-42));
        assert!(t("Integer").convert("0X1F".into()).is_err());
        assert!(t("Integer").convert("abc".into()).is_err());
    }

    #[test]
    fn fixed_width_wraps() {
        assert_eq!(conv("Int8", Value::Int(200)), Value::Int(-56));
        assert_eq!(conv("UInt8", Value::Int(-1)), Value::Int(255));
        assert_eq!(conv("UInt16", Value::Int(65536)), Value::Int(0));
        assert_eq!(conv("Int32", Value::Int(2_147_483_648)), Value::Int(-2_147_483_648));
    }

    #[test]
    fn float_widths() {
        assert_eq!(conv("Float16", Value::Float(0.1)), Value::Float(0.0999755859375));
        assert_eq!(conv("Float16", Value::Float(65520.0)), Value::Float(f64::INFINITY));
        assert_eq!(conv("Float16", Value::Float(1.0)), Value::Float(1.0));
        assert_eq!(conv("Float32", Value::Float(0.1)), Value::Float(f64::from(0.1f32)));
        assert_eq!(conv("Float", "2.5".into()), Value::Float(2.5));
    }

    #[test]
    fn float16_subnormals() {
        let min = 2f64.powi(-24);
        assert_eq!(round_f16(min), min);
        assert_eq!(round_f16(min * 0.4), 0.0);
        assert_eq!(round_f16(min * 0.6), min);
    }

    #[test]
    fn element_conversions() {
        let el = Element::new("a")
            .with_attr("href", "/x")
            .with_text(" 12 ");
        let v = Value::from(el);
        assert_eq!(conv("String", v.clone()), Value::from(" 12 "));
        assert_eq!(conv("Integer", v.clone()), Value::Int(12));
        assert_eq!(conv("Html", v.clone()), Value::from("<a href=\"/x\"> 12 </a>"));
        assert_eq!(
            conv("Map[String, String]", v),
            Value::Map(vec![(Value::from("href"), Value::from("/x"))])
        );
    }

    #[test]
    fn collections() {
        let v = Value::List(vec!["1".into(), "2".into(), "2".into()]);
        assert_eq!(
            conv("List[Integer]", v.clone()),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(2)])
        );
        assert_eq!(
            conv("Set[Integer]", v.clone()),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            conv("Tuple[Integer, String]", v),
            Value::List(vec![Value::Int(1), Value::from("2")])
        );
        assert!(t("List[Integer]").convert(Value::Int(3)).is_err());
    }

    #[test]
    fn datetimes_normalize() {
        assert_eq!(conv("DateTime", "2021-03-04".into()), Value::from("2021-03-04T00:00:00"));
        assert_eq!(
            conv("DateTime", "2021-03-04T05:06:07Z".into()),
            Value::from("2021-03-04T05:06:07+00:00")
        );
        assert_eq!(conv("DateTime", Value::Int(0)), Value::from("1970-01-01T00:00:00"));
        assert!(t("DateTime").convert("yesterday".into()).is_err());
    }

    #[test]
    fn conversions_are_idempotent() {
        for (ty, v) in [
            ("DateTime", Value::from("March 4, 2021")),
            ("Float16", Value::Float(3.3)),
            ("Int8", Value::Int(1000)),
            ("String", Value::Int(5)),
        ] {
            let once = conv(ty, v);
            assert_eq!(conv(ty, once.clone()), once, "{ty}");
        }
    }
}
