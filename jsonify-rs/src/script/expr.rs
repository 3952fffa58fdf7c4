//! Expression lexer, AST, parser, and evaluator for the `eval` command.
//!
//! The language is deliberately small: literals, `$name` variables (`$root`
//! is the pipeline value), arithmetic, comparison, glob (`=~`) and regex
//! (`=/`) matching, short-circuit logic, a ternary, and a fixed set of pure
//! functions.  There is no assignment and no access to anything outside the
//! values handed in through [`EvalContext`].
//!
//! Operator precedence (lowest → highest):
//!   ternary  →  or  →  and  →  relational  →  additive  →
//!   multiplicative  →  unary  →  primary

use std::cmp::Ordering;

use regex::Regex;

use super::value::Value;
use crate::types::DataType;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Variable source for the evaluator.
pub trait EvalContext {
    /// Look up `$name`; unknown names are `Undefined`.
    fn get_var(&self, name: &str) -> Value;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i128),
    Float(f64),
    Str(String),
    Ident(String),
    Var(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    GlobMatch,
    RegexMatch,
    NotGlobMatch,
    NotRegexMatch,

    And,
    Or,

    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    fn read_number(&mut self, start: usize) -> Result<Token, String> {
        if &self.src[start..self.pos] == "0" && self.eat('x') {
            let hex = self.take_while(|c| c.is_ascii_hexdigit());
            return i128::from_str_radix(hex, 16)
                .map(Token::Int)
                .map_err(|e| format!("bad hex literal: {e}"));
        }
        self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            self.take_while(|c| c.is_ascii_digit());
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse().map(Token::Float).map_err(|e| format!("bad number `{text}`: {e}"))
        } else {
            text.parse().map(Token::Int).map_err(|e| format!("bad number `{text}`: {e}"))
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, String> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err("unterminated string".into()),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err("unterminated string".into()),
                },
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some(c) => s.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.take_while(char::is_whitespace);
        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Ok(Token::Eof);
        };
        Ok(match ch {
            '0'..='9' => return self.read_number(start),
            '"' | '\'' => return self.read_string(ch),
            '$' => {
                let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
                if name.is_empty() {
                    return Err("expected a name after `$`".into());
                }
                Token::Var(name.to_owned())
            }
            c if c.is_alphabetic() || c == '_' => {
                self.take_while(|c| c.is_alphanumeric() || c == '_');
                Token::Ident(self.src[start..self.pos].to_owned())
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else if self.eat('~') {
                    Token::NotGlobMatch
                } else if self.eat('/') {
                    Token::NotRegexMatch
                } else {
                    Token::Bang
                }
            }
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else if self.eat('~') {
                    Token::GlobMatch
                } else if self.eat('/') {
                    Token::RegexMatch
                } else {
                    return Err("assignment is not supported; use `==`".into());
                }
            }
            '?' => Token::Question,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c => Token::Unknown(c),
        })
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                return Ok(tokens);
            }
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    GlobMatch,
    RegexMatch,
    NotGlobMatch,
    NotRegexMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.parse_ternary()?;
            if !self.eat(&Token::Colon) {
                return Err("expected ':' in ternary".into());
            }
            let else_ = self.parse_ternary()?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(else_)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                Token::GlobMatch => BinOp::GlobMatch,
                Token::RegexMatch => BinOp::RegexMatch,
                Token::NotGlobMatch => BinOp::NotGlobMatch,
                Token::NotRegexMatch => BinOp::NotRegexMatch,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Token::Minus => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Bang => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Var(name) => Ok(Expr::Var(name)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => {
                    if !self.eat(&Token::LParen) {
                        return Err(format!("unknown name `{name}`; variables need a `$`"));
                    }
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.parse_ternary()?);
                        while self.eat(&Token::Comma) {
                            args.push(self.parse_ternary()?);
                        }
                    }
                    if !self.eat(&Token::RParen) {
                        return Err(format!("expected ')' after args to {name}"));
                    }
                    Ok(Expr::Call(name, args))
                }
            },
            Token::LParen => {
                let inner = self.parse_ternary()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected ')'".into());
                }
                Ok(inner)
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

/// Parse an expression string into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    if parser.peek() != &Token::Eof {
        return Err(format!("unexpected {:?} after expression", parser.peek()));
    }
    Ok(expr)
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against the given context.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Result<Value, String> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => Ok(ctx.get_var(name)),
        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!v.as_bool())),
                UnaryOp::Neg => match number(&v)? {
                    Num::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| "integer overflow".into()),
                    Num::Float(x) => Ok(Value::Float(-x)),
                },
            }
        }
        Expr::Binary(BinOp::And, lhs, rhs) => {
            Ok(Value::Bool(eval_expr(lhs, ctx)?.as_bool() && eval_expr(rhs, ctx)?.as_bool()))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            Ok(Value::Bool(eval_expr(lhs, ctx)?.as_bool() || eval_expr(rhs, ctx)?.as_bool()))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binop(*op, &l, &r)
        }
        Expr::Ternary(cond, then, else_) => {
            if eval_expr(cond, ctx)?.as_bool() {
                eval_expr(then, ctx)
            } else {
                eval_expr(else_, ctx)
            }
        }
        Expr::Call(name, arg_exprs) => {
            let args = arg_exprs
                .iter()
                .map(|e| eval_expr(e, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call_fn(name, &args)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

fn number(v: &Value) -> Result<Num, String> {
    match v {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Float(x) => Ok(Num::Float(*x)),
        Value::Bool(b) => Ok(Num::Int(i128::from(*b))),
        Value::Undefined | Value::Null => Ok(Num::Int(0)),
        Value::Str(s) => {
            let t = s.trim();
            t.parse::<i128>()
                .map(Num::Int)
                .or_else(|_| t.parse::<f64>().map(Num::Float))
                .map_err(|_| format!("`{s}` is not a number"))
        }
        Value::Element(el) => number(&Value::Str(el.text_content())),
        other => Err(format!("{} is not a number", other.type_name())),
    }
}

fn arith(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    let (a, b) = (number(l)?, number(r)?);
    if let (Num::Int(a), Num::Int(b)) = (a, b) {
        let out = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Rem => {
                if b == 0 {
                    return Err("modulo by zero".into());
                }
                a.checked_rem(b)
                    .map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
            }
            _ => None,
        };
        if op != BinOp::Div {
            return out.map(Value::Int).ok_or_else(|| "integer overflow".into());
        }
    }
    let (a, b) = (a.as_f64(), b.as_f64());
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div if b == 0.0 => Err("division by zero".into()),
        BinOp::Div => Ok(Value::Float(a / b)),
        BinOp::Rem if b == 0.0 => Err("modulo by zero".into()),
        BinOp::Rem => Ok(Value::Float(a - b * (a / b).floor())),
        _ => unreachable!("not an arithmetic operator"),
    }
}

fn compare(l: &Value, r: &Value) -> Result<Ordering, String> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = (number(l)?.as_f64(), number(r)?.as_f64());
            a.partial_cmp(&b).ok_or_else(|| "cannot compare NaN".into())
        }
    }
}

fn equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Str(_), Value::Str(_)) => l == r,
        (Value::Str(_), _) | (_, Value::Str(_)) => l.to_string() == r.to_string(),
        _ => match (number(l), number(r)) {
            (Ok(a), Ok(b)) => a.as_f64() == b.as_f64(),
            _ => l == r,
        },
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    match op {
        BinOp::Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
            Ok(Value::Str(format!("{l}{r}")))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => arith(op, l, r),
        BinOp::Eq => Ok(Value::Bool(equal(l, r))),
        BinOp::Ne => Ok(Value::Bool(!equal(l, r))),
        BinOp::Lt => compare(l, r).map(|o| Value::Bool(o == Ordering::Less)),
        BinOp::Le => compare(l, r).map(|o| Value::Bool(o != Ordering::Greater)),
        BinOp::Gt => compare(l, r).map(|o| Value::Bool(o == Ordering::Greater)),
        BinOp::Ge => compare(l, r).map(|o| Value::Bool(o != Ordering::Less)),
        BinOp::GlobMatch => Ok(Value::Bool(glob_match(&r.as_str(), &l.as_str()))),
        BinOp::NotGlobMatch => Ok(Value::Bool(!glob_match(&r.as_str(), &l.as_str()))),
        BinOp::RegexMatch => regex_match(&r.as_str(), &l.as_str()).map(Value::Bool),
        BinOp::NotRegexMatch => regex_match(&r.as_str(), &l.as_str()).map(|m| Value::Bool(!m)),
        BinOp::And | BinOp::Or => unreachable!("handled by eval_expr"),
    }
}

fn call_fn(name: &str, args: &[Value]) -> Result<Value, String> {
    let arg = |i: usize| args.get(i).ok_or_else(|| format!("{name}: too few args"));
    let arity = |n: usize| -> Result<(), String> {
        if args.len() > n {
            Err(format!("{name}: too many args"))
        } else {
            Ok(())
        }
    };
    match name {
        "len" => {
            arity(1)?;
            let n = match arg(0)? {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(pairs) => pairs.len(),
                Value::Undefined | Value::Null => 0,
                other => other.to_string().chars().count(),
            };
            Ok(Value::Int(n as i128))
        }
        "str" => {
            arity(1)?;
            Ok(Value::Str(arg(0)?.to_string()))
        }
        "int" | "float" => {
            arity(1)?;
            let ty = if name == "int" { DataType::Integer } else { DataType::Float };
            ty.convert(arg(0)?.clone()).map_err(|e| e.to_string())
        }
        "lower" => {
            arity(1)?;
            Ok(Value::Str(arg(0)?.to_string().to_lowercase()))
        }
        "upper" => {
            arity(1)?;
            Ok(Value::Str(arg(0)?.to_string().to_uppercase()))
        }
        "trim" => {
            arity(1)?;
            Ok(Value::Str(arg(0)?.to_string().trim().to_owned()))
        }
        "contains" => {
            arity(2)?;
            let needle = arg(1)?;
            Ok(Value::Bool(match arg(0)? {
                Value::List(items) => items.contains(needle),
                Value::Map(pairs) => pairs.iter().any(|(k, _)| k == needle),
                other => other.to_string().contains(&needle.to_string()),
            }))
        }
        _ => Err(format!("unknown function `{name}`")),
    }
}

// ── Matching ──────────────────────────────────────────────────────────────────

fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen, and the text position it currently absorbs up to.
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    pi = sp + 1;
                    ti = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

fn regex_match(pattern: &str, text: &str) -> Result<bool, String> {
    Regex::new(pattern)
        .map(|re| re.is_match(text))
        .map_err(|e| format!("bad regex: {e}"))
}

/// Parse and evaluate an expression string.
pub fn eval_str(src: &str, ctx: &dyn EvalContext) -> Result<Value, String> {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestCtx {
        vars: HashMap<String, Value>,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx { vars: HashMap::new() }
        }
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&self, name: &str) -> Value {
            self.vars.get(name).cloned().unwrap_or_default()
        }
    }

    fn eval(src: &str) -> Value {
        eval_str(src, &TestCtx::new()).expect("eval failed")
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("2.5"), Value::Float(2.5));
        assert_eq!(eval("'hello'"), Value::from("hello"));
        assert_eq!(eval("true"), Value::Bool(true));
        assert_eq!(eval("null"), Value::Null);
        assert_eq!(eval("0xff"), Value::Int(255));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("10 - 4"), Value::Int(6));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("-7 % 3"), Value::Int(2));
        assert_eq!(eval("-(3 + 2)"), Value::Int(-5));
        assert!(eval_str("1 / 0", &TestCtx::new()).is_err());
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let ctx = TestCtx::new().with("min", Value::Int(i128::MIN));
        assert!(eval_str("$min % -1", &ctx).unwrap_err().contains("overflow"));
        assert!(eval_str("-$min", &ctx).unwrap_err().contains("overflow"));
        assert!(eval_str("$min - 1", &ctx).is_err());
        assert_eq!(eval_str("$min % 7", &ctx).unwrap(), Value::Int(i128::MIN.rem_euclid(7)));
    }

    #[test]
    fn string_concat() {
        assert_eq!(eval("'a' + 1"), Value::from("a1"));
        assert_eq!(eval("'a' + 'b'"), Value::from("ab"));
    }

    #[test]
    fn comparison_and_logic() {
        assert_eq!(eval("3 == 3"), Value::Bool(true));
        assert_eq!(eval("'3' == 3"), Value::Bool(true));
        assert_eq!(eval("2 < 3 && 'b' > 'a'"), Value::Bool(true));
        assert_eq!(eval("0 || ''"), Value::Bool(false));
        assert_eq!(eval("!0"), Value::Bool(true));
    }

    #[test]
    fn ternary() {
        assert_eq!(eval("1 ? 'yes' : 'no'"), Value::from("yes"));
        assert_eq!(eval("0 ? 'yes' : 0 ? 'maybe' : 'no'"), Value::from("no"));
    }

    #[test]
    fn variables() {
        let ctx = TestCtx::new().with("root", Value::from("12"));
        assert_eq!(eval_str("$root * 2", &ctx).unwrap(), Value::Int(24));
        assert_eq!(eval_str("$missing", &ctx).unwrap(), Value::Undefined);
        assert!(eval_str("root", &ctx).is_err());
    }

    #[test]
    fn functions() {
        assert_eq!(eval("len('héllo')"), Value::Int(5));
        assert_eq!(eval("upper('ab') + lower('CD')"), Value::from("ABcd"));
        assert_eq!(eval("int(' 0x10 ')"), Value::Int(16));
        assert_eq!(eval("contains('haystack', 'st')"), Value::Bool(true));
        assert!(eval_str("system('ls')", &TestCtx::new()).is_err());
    }

    #[test]
    fn matching() {
        assert_eq!(eval("'hello' =~ 'hel*'"), Value::Bool(true));
        assert_eq!(eval("'hello' !~ 'h?llo'"), Value::Bool(false));
        assert_eq!(eval("'hello' =/ '^hel.o$'"), Value::Bool(true));
        assert!(eval_str("'x' =/ '('", &TestCtx::new()).is_err());
    }

    #[test]
    fn rejects_assignment_and_trailing_input() {
        assert!(parse_expr("x = 1").is_err());
        assert!(parse_expr("1 2").is_err());
    }

    #[test]
    fn glob_star() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("foo*", "foobar"));
        assert!(!glob_match("foo*", "barfoo"));
        assert!(glob_match("f*r", "foobar"));
        assert!(glob_match("a*b?d", "axxbcd"));
        assert!(!glob_match("a*b?d", "axxbd"));
        assert!(glob_match("**", ""));
    }

    #[test]
    fn glob_long_text() {
        let text = "a".repeat(200_000);
        assert!(glob_match("*a", &text));
        assert!(!glob_match("*b", &text));
    }
}
