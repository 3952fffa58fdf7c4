//! Template key and command-line grammar.
//!
//! Template keys take one of three forms:
//!
//! | Form | Example | Meaning |
//! |------|---------|---------|
//! | `$name` | `$base: "https://x"` | variable |
//! | `name(params)` | `title(sel): [...]` | user function (`init`/`parse`/`final` are hooks) |
//! | `Type name` | `List[String] tags: [...]` | typed entry |
//!
//! A command line is `name` or `name(arg, key=arg, ...)`.  Arguments are
//! split on top-level commas only; quotes and `()`, `[]`, `{}` nest.  Each
//! argument is a keyword, a `$ref`, a lambda `(x) -> call(...)`, a nested
//! call, or a YAML literal.
//!
//! Lines may also be written as lists: `[name, arg, ..., {key: arg}]`.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::script::node::{Arg, CommandCall, Function};
use crate::script::value::Value;
use crate::types::DataType;

/// Classified template key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyForm {
    Variable(String),
    Function { name: String, params: Vec<String> },
    Entry { dtype: DataType, name: String },
}

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Classify a template key.
pub fn classify_key(key: &str) -> Result<KeyForm> {
    let key = key.trim();
    if let Some(name) = key.strip_prefix('$') {
        if is_ident(name) {
            return Ok(KeyForm::Variable(name.to_owned()));
        }
        return Err(Error::parse(format!("invalid variable name `{key}`")));
    }
    if key.ends_with(')') {
        if let Some(open) = key.find('(') {
            let name = key[..open].trim();
            if is_ident(name) {
                let params = split_args(&key[open + 1..key.len() - 1])?
                    .into_iter()
                    .map(|p| param_name(&p, key))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(KeyForm::Function {
                    name: name.to_owned(),
                    params,
                });
            }
        }
    }
    if let Some((ty, name)) = split_type_and_name(key) {
        let dtype = DataType::parse(ty)?;
        return Ok(KeyForm::Entry {
            dtype,
            name: name.to_owned(),
        });
    }
    Err(Error::parse(format!("unrecognized template key `{key}`")))
}

fn param_name(p: &str, src: &str) -> Result<String> {
    let name = p.strip_prefix('$').unwrap_or(p);
    if is_ident(name) {
        Ok(name.to_owned())
    } else {
        Err(Error::parse(format!("invalid parameter `{p}` in `{src}`")))
    }
}

/// Split `List[Map[String, Int]] name` at the last top-level space.
fn split_type_and_name(key: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut split = None;
    for (i, c) in key.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => split = Some(i),
            _ => {}
        }
    }
    let i = split?;
    let (ty, name) = (key[..i].trim(), key[i..].trim());
    (!ty.is_empty() && !name.is_empty()).then_some((ty, name))
}

// ── Argument splitting ────────────────────────────────────────────────────────

/// Split an argument list on top-level commas.
///
/// Fails on unbalanced quotes or brackets and on empty arguments.
pub fn split_args(src: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut closers: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = src.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' && q == '"' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => closers.push(')'),
            '[' => closers.push(']'),
            '{' => closers.push('}'),
            ')' | ']' | '}' => {
                if closers.pop() != Some(c) {
                    return Err(Error::parse(format!("unbalanced `{c}` in `{src}`")));
                }
            }
            ',' if closers.is_empty() => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if let Some(q) = quote {
        return Err(Error::parse(format!("unterminated {q} quote in `{src}`")));
    }
    if let Some(c) = closers.last() {
        return Err(Error::parse(format!("missing `{c}` in `{src}`")));
    }
    if parts.is_empty() && current.trim().is_empty() {
        return Ok(Vec::new());
    }
    parts.push(current);
    let parts: Vec<String> = parts.into_iter().map(|p| p.trim().to_owned()).collect();
    if parts.iter().any(String::is_empty) {
        return Err(Error::parse(format!("empty argument in `{src}`")));
    }
    Ok(parts)
}

/// Byte index of the bracket closing the one at `open`, skipping quotes.
fn matching_close(src: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in src[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte index of a keyword `=` at the top level of `src`, if any.
fn keyword_split(src: &str) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if !matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) && !matches!(next, Some(b'=' | b'>')) {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Calls ─────────────────────────────────────────────────────────────────────

/// Parse one command line such as `regex("\\d+", "get", 0)`.
pub fn parse_call(line: &str) -> Result<CommandCall> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::parse("empty command line"));
    }
    if is_ident(line) {
        return Ok(CommandCall::new(line));
    }
    let open = line
        .find('(')
        .ok_or_else(|| Error::parse(format!("malformed command call `{line}`")))?;
    let name = line[..open].trim();
    if !is_ident(name) {
        return Err(Error::parse(format!("invalid command name in `{line}`")));
    }
    if !line.ends_with(')') {
        return Err(Error::parse(format!("malformed command call `{line}`")));
    }
    let mut call = CommandCall::new(name);
    for part in split_args(&line[open + 1..line.len() - 1])? {
        if let Some(eq) = keyword_split(&part) {
            let key = part[..eq].trim();
            if is_ident(key) {
                if call.kwargs.iter().any(|(k, _)| k == key) {
                    return Err(Error::parse(format!("keyword `{key}` repeated in `{line}`")));
                }
                call.kwargs.push((key.to_owned(), parse_arg(part[eq + 1..].trim())?));
                continue;
            }
        }
        if !call.kwargs.is_empty() {
            return Err(Error::parse(format!(
                "positional argument follows keyword argument in `{line}`"
            )));
        }
        call.args.push(parse_arg(&part)?);
    }
    Ok(call)
}

/// Classify and parse a single (non-keyword) argument.
pub fn parse_arg(src: &str) -> Result<Arg> {
    let src = src.trim();
    if src.is_empty() {
        return Err(Error::parse("empty argument"));
    }
    if let Some(name) = src.strip_prefix('$') {
        if is_ident(name) {
            return Ok(Arg::Ref(name.to_owned()));
        }
    }
    if src.starts_with('(') {
        if let Some(close) = matching_close(src, 0) {
            if let Some(body) = src[close + 1..].trim_start().strip_prefix("->") {
                let params = split_args(&src[1..close])?
                    .into_iter()
                    .map(|p| param_name(&p, src))
                    .collect::<Result<Vec<_>>>()?;
                let call = parse_call(body)?;
                return Ok(Arg::Func(Rc::new(Function::new(params, vec![call]))));
            }
        }
    }
    if looks_like_call(src) {
        return Ok(Arg::Func(Rc::new(Function::new(Vec::new(), vec![parse_call(src)?]))));
    }
    parse_literal(src).map(Arg::Literal)
}

fn looks_like_call(src: &str) -> bool {
    match src.find('(') {
        Some(open) => {
            is_ident(src[..open].trim_end()) && matching_close(src, open) == Some(src.len() - 1)
        }
        None => false,
    }
}

/// Parse a literal with YAML scalar/collection rules.
pub fn parse_literal(src: &str) -> Result<Value> {
    let doc: serde_yaml::Value = serde_yaml::from_str(src)
        .map_err(|e| Error::parse(format!("invalid literal `{src}`: {e}")))?;
    Ok(Value::from(doc))
}

/// Parse a line given either as a string or in list form.
pub fn parse_line(line: &Value) -> Result<CommandCall> {
    match line {
        Value::Str(s) => parse_call(s),
        Value::List(items) => {
            let (head, rest) = items
                .split_first()
                .ok_or_else(|| Error::parse("empty command list"))?;
            let Value::Str(name) = head else {
                return Err(Error::parse(format!("command name must be a string, got {}", head.type_name())));
            };
            if !is_ident(name) {
                return Err(Error::parse(format!("invalid command name `{name}`")));
            }
            let mut call = CommandCall::new(name.as_str());
            let (positional, keywords) = match rest.split_last() {
                Some((Value::Map(pairs), init)) => (init, Some(pairs)),
                _ => (rest, None),
            };
            call.args = positional.iter().map(list_arg).collect();
            if let Some(pairs) = keywords {
                for (k, v) in pairs {
                    let Value::Str(k) = k else {
                        return Err(Error::parse("keyword names must be strings"));
                    };
                    call.kwargs.push((k.clone(), list_arg(v)));
                }
            }
            Ok(call)
        }
        other => Err(Error::parse(format!("a command line cannot be {}", other.type_name()))),
    }
}

fn list_arg(v: &Value) -> Arg {
    match v {
        Value::Str(s) if s.starts_with('$') && is_ident(&s[1..]) => Arg::Ref(s[1..].to_owned()),
        other => Arg::Literal(other.clone()),
    }
}

/// Build a function from a hook/function body: one line or a list of lines.
pub fn parse_body(params: Vec<String>, body: &Value) -> Result<Function> {
    let calls = match body {
        Value::Null => Vec::new(),
        Value::Str(_) => vec![parse_line(body)?],
        Value::List(lines) => lines.iter().map(parse_line).collect::<Result<Vec<_>>>()?,
        other => {
            return Err(Error::parse(format!(
                "a function body must be a line or a list of lines, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Function::new(params, calls))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn split_respects_nesting() {
        assert_eq!(split_args(r#""a,b", [1,2,3]"#).unwrap(), vec![r#""a,b""#, "[1,2,3]"]);
        assert_eq!(split_args("f(a, b), {x: 1, y: 2}, 'c'").unwrap().len(), 3);
        assert!(split_args("").unwrap().is_empty());
        assert_eq!(split_args(r#""say \"hi\", ok""#).unwrap().len(), 1);
    }

    #[test]
    fn split_rejects_imbalance() {
        for bad in [r#""a, "b"#, "(a, b", "[a)", "a, , b", "a]"] {
            let err = split_args(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{bad}");
        }
    }

    #[test]
    fn unbalanced_quote_in_call() {
        let err = parse_call(r#"f("a, "b")"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn bare_name_is_a_call() {
        assert_eq!(parse_call(" text ").unwrap(), CommandCall::new("text"));
    }

    #[test]
    fn argument_forms() {
        let call = parse_call(r#"f("x", 3, $v, g(1), (a) -> h($a), k=[1, 2])"#).unwrap();
        assert_eq!(call.name, "f");
        assert_eq!(call.args[0], Arg::Literal(Value::from("x")));
        assert_eq!(call.args[1], Arg::Literal(Value::Int(3)));
        assert_eq!(call.args[2], Arg::Ref("v".into()));
        match &call.args[3] {
            Arg::Func(f) => {
                assert!(f.params.is_empty());
                assert_eq!(f.calls[0].name, "g");
            }
            other => panic!("expected nested call, got {other:?}"),
        }
        match &call.args[4] {
            Arg::Func(f) => {
                assert_eq!(f.params, vec!["a".to_string()]);
                assert_eq!(f.calls[0].args, vec![Arg::Ref("a".into())]);
            }
            other => panic!("expected lambda, got {other:?}"),
        }
        assert_eq!(
            call.kwargs,
            vec![(
                "k".to_string(),
                Arg::Literal(Value::List(vec![Value::Int(1), Value::Int(2)]))
            )]
        );
    }

    #[test]
    fn equality_operators_are_not_keywords() {
        let call = parse_call(r#"eval("$root == 1")"#).unwrap();
        assert!(call.kwargs.is_empty());
        let call = parse_call("f(a == b)").unwrap();
        assert!(call.kwargs.is_empty());
    }

    #[test]
    fn positional_after_keyword_rejected() {
        assert!(parse_call("f(a=1, 2)").is_err());
        assert!(parse_call("f(a=1, a=2)").is_err());
    }

    #[test]
    fn malformed_calls() {
        for bad in ["f(", "f(a))", "1f()", "f(a)(b)", "f x"] {
            assert!(parse_call(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn key_forms() {
        assert_eq!(classify_key("$base").unwrap(), KeyForm::Variable("base".into()));
        assert_eq!(
            classify_key("pick(sel, $n)").unwrap(),
            KeyForm::Function { name: "pick".into(), params: vec!["sel".into(), "n".into()] }
        );
        assert_eq!(
            classify_key("Map[String, Int32] counts").unwrap(),
            KeyForm::Entry {
                dtype: DataType::parse("Map[String, Int32]").unwrap(),
                name: "counts".into()
            }
        );
        assert!(classify_key("justaname").is_err());
        assert!(classify_key("Bogus name").is_err());
        assert!(classify_key("$1bad").is_err());
    }

    #[test]
    fn list_form_lines() {
        let line = Value::List(vec![
            "regex".into(),
            "\\d+".into(),
            "$mode".into(),
            Value::Map(vec![("flags".into(), Value::Int(1))]),
        ]);
        let call = parse_line(&line).unwrap();
        assert_eq!(call.name, "regex");
        assert_eq!(call.args, vec![Arg::Literal("\\d+".into()), Arg::Ref("mode".into())]);
        assert_eq!(call.kwargs, vec![("flags".into(), Arg::Literal(Value::Int(1)))]);
    }

    #[test]
    fn bodies() {
        let body = Value::List(vec!["text".into(), Value::List(vec!["strip".into()])]);
        let f = parse_body(Vec::new(), &body).unwrap();
        assert_eq!(f.calls.len(), 2);
        assert!(parse_body(Vec::new(), &Value::Int(1)).is_err());
    }
}
