//! Built-in commands.
//!
//! Every command receives the pipeline value (`root`) and its evaluated
//! arguments and returns the next pipeline value.  Document and string
//! commands pass `null`/`undefined` roots through untouched, so a
//! `select_one` that found nothing does not abort the rest of the pipeline.
//!
//! | Group | Commands |
//! |-------|----------|
//! | selection | `select`, `select_one`, `select_or`, `select_one_or` |
//! | tree editing | `remove`, `delete_attrib`, `wrap`, `wrap_bare`, `clean`, `minify`, `copy`, `parse_html` |
//! | extraction | `text`, `inner_text`, `inner_html`, `html`, `attr`, `attrs` |
//! | strings | `strip`, `split`, `lower`, `upper`, `replace`, `quote`, `unquote`, `regex`, `concat_str` |
//! | lists | `concat_list`, `join`, `first`, `last`, `index`, `len` |
//! | control | `foreach`, `map`, `filter`, `apply`, `default`, `set`, `get`, `eval` |

use std::rc::Rc;

use regex::{Captures, Regex};

use crate::dom::{self, Content, Element};
use crate::error::{Error, Result};
use crate::script::expr::{self, EvalContext};
use crate::script::node::{Args, Context};
use crate::script::registry::Registry;
use crate::script::value::Value;
use crate::selector::{Match, Outline, Selector};

/// Install the built-in command set.
pub fn register_builtins(reg: &mut Registry) {
    reg.register("select", cmd_select);
    reg.register("select_one", cmd_select_one);
    reg.register("select_or", cmd_select_or);
    reg.register("select_one_or", cmd_select_one_or);

    reg.register("remove", cmd_remove);
    reg.register("delete_attrib", cmd_delete_attrib);
    reg.register("wrap", cmd_wrap);
    reg.register("wrap_bare", cmd_wrap_bare);
    reg.register("clean", cmd_clean);
    reg.register("minify", cmd_minify);
    reg.register("copy", cmd_copy);
    reg.register("parse_html", cmd_parse_html);

    reg.register("text", cmd_text);
    reg.register("inner_text", cmd_inner_text);
    reg.register("inner_html", cmd_inner_html);
    reg.register("html", cmd_html);
    reg.register("attr", cmd_attr);
    reg.register("attrs", cmd_attrs);

    reg.register("strip", |_ctx, root, _args| on_str(root, |s| Ok(Value::from(s.trim()))));
    reg.register("lower", |_ctx, root, _args| on_str(root, |s| Ok(Value::Str(s.to_lowercase()))));
    reg.register("upper", |_ctx, root, _args| on_str(root, |s| Ok(Value::Str(s.to_uppercase()))));
    reg.register("split", cmd_split);
    reg.register("replace", cmd_replace);
    reg.register("quote", cmd_quote);
    reg.register("unquote", cmd_unquote);
    reg.register("regex", cmd_regex);
    reg.register("concat_str", cmd_concat_str);

    reg.register("concat_list", cmd_concat_list);
    reg.register("join", cmd_join);
    reg.register("first", |_ctx, root, _args| nth(root, 0, "first"));
    reg.register("last", |_ctx, root, _args| nth(root, -1, "last"));
    reg.register("index", |_ctx, root, args| {
        let i = int_arg(&args, 0, "index")?;
        nth(root, i, "index")
    });
    reg.register("len", cmd_len);

    reg.register_higher_order("foreach", cmd_foreach);
    reg.register_higher_order("map", cmd_foreach);
    reg.register_higher_order("filter", cmd_filter);
    reg.register_higher_order("apply", cmd_apply);
    reg.register("default", cmd_default);
    reg.register("set", cmd_set);
    reg.register("get", cmd_get);
    reg.register("eval", cmd_eval);
}

// ── Argument accessors ────────────────────────────────────────────────────────

fn arg<'a>(args: &'a Args, idx: usize, name: &str) -> Result<&'a Value> {
    args.get(idx)
        .ok_or_else(|| Error::command(name, format!("missing argument {}", idx + 1)))
}

fn get_str(args: &Args, idx: usize, name: &str) -> Result<String> {
    arg(args, idx, name).map(Value::as_str)
}

fn opt_str(args: &Args, idx: usize) -> Option<String> {
    args.get(idx).filter(|v| !v.is_nullish()).map(Value::as_str)
}

fn int_arg(args: &Args, idx: usize, name: &str) -> Result<i128> {
    let v = arg(args, idx, name)?;
    v.as_int()
        .ok_or_else(|| Error::command(name, format!("expected an integer, got {}", v.type_name())))
}

/// Positional `idx`, else keyword `key`, else `default`.
fn flag(args: &Args, idx: usize, key: &str, default: bool) -> bool {
    args.get(idx)
        .or_else(|| args.kw(key))
        .map_or(default, Value::as_bool)
}

fn rest(args: &Args, from: usize) -> &[Value] {
    &args.positional[from.min(args.positional.len())..]
}

/// Resolve a possibly negative index against `len`.
fn index_of(len: usize, i: i128) -> Option<usize> {
    let len = len as i128;
    let idx = if i < 0 { i + len } else { i };
    (0..len).contains(&idx).then_some(idx as usize)
}

// ── Root adapters ─────────────────────────────────────────────────────────────

fn on_element(root: Value, name: &str, f: impl FnOnce(Rc<Element>) -> Result<Value>) -> Result<Value> {
    match root {
        Value::Element(el) => f(el),
        v if v.is_nullish() => Ok(v),
        other => Err(Error::command(
            name,
            format!("expected an element, got {}", other.type_name()),
        )),
    }
}

/// Apply a string transform; lists are mapped item by item.
fn on_str(root: Value, f: impl Fn(String) -> Result<Value> + Copy) -> Result<Value> {
    match root {
        v if v.is_nullish() => Ok(v),
        Value::List(items) => items
            .into_iter()
            .map(|item| on_str(item, f))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => f(other.as_str()),
    }
}

fn compile(src: &str, name: &str) -> Result<Selector> {
    Selector::parse(src).map_err(|e| Error::command(name, e))
}

fn to_values(outline: &Outline, matches: Vec<Match>) -> Vec<Value> {
    matches
        .into_iter()
        .filter_map(|m| match m {
            Match::Element(order) => outline.element(order).map(|el| Value::Element(Rc::clone(el))),
            Match::Text(s) | Match::Attr(s) => Some(Value::Str(s)),
        })
        .collect()
}

/// Union of several selectors: elements in document order, then strings.
fn union(outline: &Outline, selectors: &[Selector]) -> Vec<Match> {
    let mut orders: Vec<usize> = Vec::new();
    let mut strings = Vec::new();
    for sel in selectors {
        for m in sel.select(outline) {
            match m {
                Match::Element(order) => orders.push(order),
                other => strings.push(other),
            }
        }
    }
    orders.sort_unstable();
    orders.dedup();
    orders.into_iter().map(Match::Element).chain(strings).collect()
}

/// Child-index paths of the matched elements below the root, last first.
fn target_paths(outline: &Outline, matches: Vec<Match>) -> Vec<Vec<usize>> {
    let mut orders: Vec<usize> = matches
        .into_iter()
        .filter_map(|m| match m {
            Match::Element(order) if order > 0 => Some(order),
            _ => None,
        })
        .collect();
    orders.sort_unstable_by(|a, b| b.cmp(a));
    orders.dedup();
    orders.into_iter().filter_map(|order| outline.path(order)).collect()
}

fn selectors(args: &[Value], name: &str) -> Result<Vec<Selector>> {
    args.iter().map(|v| compile(&v.as_str(), name)).collect()
}

// ── Selection ─────────────────────────────────────────────────────────────────

fn cmd_select(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let sel = compile(&get_str(&args, 0, "select")?, "select")?;
    on_element(root, "select", |el| {
        let outline = Outline::new(&el);
        let found = sel.select(&outline);
        Ok(Value::List(to_values(&outline, found)))
    })
}

fn cmd_select_one(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    match cmd_select(ctx, root, args)? {
        Value::List(items) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
        other => Ok(other),
    }
}

fn cmd_select_or(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    if args.positional.is_empty() {
        return Err(Error::command("select_or", "expected at least one selector"));
    }
    let sels = selectors(&args.positional, "select_or")?;
    on_element(root, "select_or", |el| {
        let outline = Outline::new(&el);
        let found = union(&outline, &sels);
        Ok(Value::List(to_values(&outline, found)))
    })
}

fn cmd_select_one_or(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    match cmd_select_or(ctx, root, args)? {
        Value::List(items) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
        other => Ok(other),
    }
}

// ── Tree editing ──────────────────────────────────────────────────────────────

fn cmd_remove(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let sels = selectors(&args.positional, "remove")?;
    on_element(root, "remove", |mut el| {
        let paths = {
            let outline = Outline::new(&el);
            let found = union(&outline, &sels);
            target_paths(&outline, found)
        };
        if paths.is_empty() {
            return Ok(Value::Element(el));
        }
        // Later elements first, so earlier paths stay valid.
        let tree = Rc::make_mut(&mut el);
        for path in paths {
            tree.remove_at(&path);
        }
        Ok(Value::Element(el))
    })
}

fn cmd_delete_attrib(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let sel = compile(&get_str(&args, 0, "delete_attrib")?, "delete_attrib")?;
    let names: Vec<String> = rest(&args, 1).iter().map(Value::as_str).collect();
    on_element(root, "delete_attrib", |mut el| {
        let (paths, includes_root) = {
            let outline = Outline::new(&el);
            let found = sel.select(&outline);
            let includes_root = found.contains(&Match::Element(0));
            (target_paths(&outline, found), includes_root)
        };
        let tree = Rc::make_mut(&mut el);
        let roots = includes_root.then(Vec::new);
        for path in paths.iter().chain(roots.iter()) {
            if let Some(target) = tree.get_mut(path) {
                for name in &names {
                    target.remove_attr(name);
                }
            }
        }
        Ok(Value::Element(el))
    })
}

fn cmd_wrap(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let mut parent = Element::new(get_str(&args, 0, "wrap")?);
    for (k, v) in &args.keyword {
        parent.set_attr(k.as_str(), v.as_str());
    }
    match root {
        v if v.is_nullish() => return Ok(v),
        Value::List(items) => {
            for item in items {
                push_content(&mut parent, item);
            }
        }
        other => push_content(&mut parent, other),
    }
    Ok(Value::from(parent))
}

fn push_content(parent: &mut Element, value: Value) {
    match value {
        Value::Element(el) => parent.children.push(Content::Element(el)),
        v if v.is_nullish() => {}
        other => parent.children.push(Content::Text(other.as_str())),
    }
}

/// Copy the element under a new tag, dropping direct children that match
/// any bypass selector.
fn cmd_wrap_bare(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let tag = get_str(&args, 0, "wrap_bare")?;
    let mut attrs = Vec::new();
    let mut bypass_from = 1;
    match args.get(1) {
        Some(Value::Map(pairs)) => {
            attrs = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            bypass_from = 2;
        }
        Some(v) if v.is_nullish() => bypass_from = 2,
        _ => {}
    }
    let bypass = selectors(rest(&args, bypass_from), "wrap_bare")?;
    on_element(root, "wrap_bare", |el| {
        let mut direct: Vec<usize> = {
            let outline = Outline::new(&el);
            union(&outline, &bypass)
                .into_iter()
                .filter_map(|m| match m {
                    Match::Element(order) => outline.root_slot(order),
                    _ => None,
                })
                .collect()
        };
        direct.sort_unstable_by(|a, b| b.cmp(a));
        let mut copy = Rc::unwrap_or_clone(el);
        for i in direct {
            copy.remove_at(&[i]);
        }
        copy.tag = tag;
        for (k, v) in attrs {
            copy.set_attr(k, v);
        }
        Ok(Value::from(copy))
    })
}

fn cmd_clean(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let mut opts = ctx.config().clean.clone();
    for (k, v) in &args.keyword {
        opts.set(k, v).map_err(|e| Error::command("clean", e))?;
    }
    on_element(root, "clean", |mut el| {
        Rc::make_mut(&mut el).clean(&opts);
        Ok(Value::Element(el))
    })
}

fn cmd_minify(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let line_break = flag(&args, 0, "line_break", true);
    let tab = flag(&args, 1, "tab", true);
    let quoted = flag(&args, 2, "quoted", true);
    on_element(root, "minify", |mut el| {
        Rc::make_mut(&mut el).minify(line_break, tab, quoted);
        Ok(Value::Element(el))
    })
}

fn cmd_copy(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    on_element(root, "copy", |el| Ok(Value::from(Element::clone(&el))))
}

fn cmd_parse_html(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    match root {
        Value::Element(_) => Ok(root),
        v if v.is_nullish() => Ok(v),
        other => Ok(Value::from(dom::parse_html(&other.as_str()))),
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

fn strip_if(ctx: &Context<'_>, s: String) -> Value {
    if ctx.config().strip_text {
        Value::from(s.trim())
    } else {
        Value::Str(s)
    }
}

/// Leading text of the element (before its first child element).
fn cmd_text(ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    let text = match root {
        Value::Element(el) => el.text(),
        v if v.is_nullish() => return Ok(v),
        other => other.as_str(),
    };
    Ok(strip_if(ctx, text))
}

fn cmd_inner_text(ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    let text = match root {
        Value::Element(el) => el.text_content(),
        v if v.is_nullish() => return Ok(v),
        other => other.as_str(),
    };
    Ok(strip_if(ctx, text))
}

fn cmd_inner_html(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    on_element(root, "inner_html", |el| Ok(Value::Str(el.inner_html())))
}

fn cmd_html(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    on_element(root, "html", |el| Ok(Value::Str(el.to_html())))
}

fn cmd_attr(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let name = get_str(&args, 0, "attr")?;
    on_element(root, "attr", |el| {
        Ok(el.get_attr(&name).map_or(Value::Null, Value::from))
    })
}

fn cmd_attrs(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    on_element(root, "attrs", |el| {
        Ok(Value::Map(
            el.attrs
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
                .collect(),
        ))
    })
}

// ── Strings ───────────────────────────────────────────────────────────────────

fn cmd_split(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let sep = opt_str(&args, 0);
    if root.is_nullish() {
        return Ok(root);
    }
    let s = root.as_str();
    let parts: Vec<Value> = match sep.as_deref() {
        None => s.split_whitespace().map(Value::from).collect(),
        Some("") => return Err(Error::command("split", "empty separator")),
        Some(sep) => s.split(sep).map(Value::from).collect(),
    };
    Ok(Value::List(parts))
}

fn cmd_replace(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let old = get_str(&args, 0, "replace")?;
    let new = get_str(&args, 1, "replace")?;
    on_str(root, |s| Ok(Value::Str(s.replace(old.as_str(), new.as_str()))))
}

/// Percent-encode, leaving `/` intact.
fn cmd_quote(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    on_str(root, |s| Ok(Value::Str(urlencoding::encode(&s).replace("%2F", "/"))))
}

fn cmd_unquote(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    on_str(root, |s| {
        urlencoding::decode(&s)
            .map(|d| Value::Str(d.into_owned()))
            .map_err(|e| Error::command("unquote", e.to_string()))
    })
}

/// One `findall` item: the whole match, the only group, or all groups.
fn findall_item(caps: &Captures<'_>) -> Value {
    let group = |i: usize| Value::from(caps.get(i).map_or("", |m| m.as_str()));
    match caps.len() {
        1 => group(0),
        2 => group(1),
        n => Value::List((1..n).map(group).collect()),
    }
}

fn cmd_regex(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    const NAME: &str = "regex";
    let pattern = get_str(&args, 0, NAME)?;
    let re = Regex::new(&pattern).map_err(|e| Error::command(NAME, e.to_string()))?;
    let action = opt_str(&args, 1).unwrap_or_else(|| "get".to_owned());
    let subject = match &root {
        v if v.is_nullish() => return Ok(root),
        Value::Element(el) => el.to_html(),
        other => other.as_str(),
    };
    let extra = rest(&args, 2);
    match action.as_str() {
        "get" => {
            let found: Vec<Value> = re.captures_iter(&subject).map(|c| findall_item(&c)).collect();
            let pick = |v: &Value| -> Result<Option<Value>> {
                let i = v
                    .as_int()
                    .ok_or_else(|| Error::command(NAME, format!("bad index {v}")))?;
                Ok(index_of(found.len(), i).map(|i| found[i].clone()))
            };
            match extra {
                [] => Ok(Value::List(found.clone())),
                [one] => Ok(pick(one)?.unwrap_or(Value::Null)),
                many => {
                    let mut out = Vec::with_capacity(many.len());
                    for v in many {
                        out.extend(pick(v)?);
                    }
                    Ok(Value::List(out))
                }
            }
        }
        "search" => {
            let group = match extra.first() {
                Some(v) => v
                    .as_int()
                    .and_then(|g| usize::try_from(g).ok())
                    .ok_or_else(|| Error::command(NAME, format!("bad group {v}")))?,
                None => 0,
            };
            Ok(re
                .captures(&subject)
                .and_then(|c| c.get(group).map(|m| Value::from(m.as_str())))
                .unwrap_or(Value::Null))
        }
        "replace" => {
            let replacement = extra.first().map(Value::as_str).unwrap_or_default();
            Ok(Value::Str(re.replace_all(&subject, replacement.as_str()).into_owned()))
        }
        "split" => Ok(Value::List(re.split(&subject).map(Value::from).collect())),
        other => Err(Error::command(NAME, format!("unknown action `{other}`"))),
    }
}

fn cmd_concat_str(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let mode = get_str(&args, 0, "concat_str")?;
    let sep = opt_str(&args, 1).unwrap_or_default();
    let parts = rest(&args, 2).iter().map(Value::as_str);
    let joined: Vec<String> = match mode.as_str() {
        "pre" | "prefix" => parts.chain(std::iter::once(root.as_str())).collect(),
        "post" | "suffix" => std::iter::once(root.as_str()).chain(parts).collect(),
        other => return Err(Error::command("concat_str", format!("unknown mode `{other}`"))),
    };
    Ok(Value::Str(joined.join(&sep)))
}

// ── Lists ─────────────────────────────────────────────────────────────────────

fn items(root: &Value, name: &str) -> Result<Vec<Value>> {
    root.items().map_err(|e| Error::command(name, e))
}

fn flatten(items: Vec<Value>, recursive: bool, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::List(inner) if recursive => flatten(inner, true, out),
            Value::List(inner) => out.extend(inner),
            other => out.push(other),
        }
    }
}

fn cmd_concat_list(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let recursive = flag(&args, 0, "recursive", false);
    let mut out = Vec::new();
    flatten(items(&root, "concat_list")?, recursive, &mut out);
    Ok(Value::List(out))
}

fn cmd_join(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let sep = opt_str(&args, 0)
        .or_else(|| args.kw("sep").map(Value::as_str))
        .unwrap_or_default();
    let parts: Vec<String> = items(&root, "join")?.iter().map(Value::as_str).collect();
    Ok(Value::Str(parts.join(&sep)))
}

fn nth(root: Value, i: i128, name: &str) -> Result<Value> {
    if root.is_nullish() {
        return Ok(root);
    }
    let all = items(&root, name)?;
    Ok(index_of(all.len(), i).map_or(Value::Null, |i| all[i].clone()))
}

fn cmd_len(_ctx: &mut Context<'_>, root: Value, _args: Args) -> Result<Value> {
    let n = match &root {
        Value::Map(pairs) => pairs.len(),
        other => items(other, "len")?.len(),
    };
    Ok(Value::Int(n as i128))
}

// ── Control ───────────────────────────────────────────────────────────────────

/// Run the callable in `args[0]` on `item`.  A command name may be followed
/// by that command's own arguments.
fn run_callable(ctx: &mut Context<'_>, name: &str, args: &Args, item: Value) -> Result<Value> {
    match arg(args, 0, name)? {
        Value::Str(cmd) => ctx.invoke(cmd, item, rest(args, 1).to_vec(), Vec::new()),
        callable => ctx.apply(callable, item),
    }
}

fn cmd_foreach(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let all = items(&root, "foreach")?;
    let mut out = Vec::with_capacity(all.len());
    if let Some(template) = args.kw("template") {
        for item in all {
            out.push(ctx.render_template(template, item)?);
        }
    } else {
        for item in all {
            out.push(run_callable(ctx, "foreach", &args, item)?);
        }
    }
    Ok(Value::List(out))
}

fn cmd_filter(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let mut out = Vec::new();
    for item in items(&root, "filter")? {
        if run_callable(ctx, "filter", &args, item.clone())?.as_bool() {
            out.push(item);
        }
    }
    Ok(Value::List(out))
}

fn cmd_apply(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    match args.kw("template") {
        Some(template) => ctx.render_template(template, root),
        None => run_callable(ctx, "apply", &args, root),
    }
}

/// Replace a `null`/`undefined` root with the given value.
fn cmd_default(_ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    if root.is_nullish() {
        Ok(arg(&args, 0, "default")?.clone())
    } else {
        Ok(root)
    }
}

fn cmd_set(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let name = get_str(&args, 0, "set")?;
    let value = args.get(1).cloned().unwrap_or_else(|| root.clone());
    ctx.set_variable(&name, value);
    Ok(root)
}

fn cmd_get(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let name = get_str(&args, 0, "get")?;
    let value = ctx.lookup(name.trim_start_matches('$'));
    ctx.force(value, &root)
}

struct PipelineVars<'c, 'a> {
    ctx: &'c Context<'a>,
    root: &'c Value,
}

impl EvalContext for PipelineVars<'_, '_> {
    fn get_var(&self, name: &str) -> Value {
        if name == "root" {
            self.root.clone()
        } else {
            self.ctx.lookup(name)
        }
    }
}

fn cmd_eval(ctx: &mut Context<'_>, root: Value, args: Args) -> Result<Value> {
    let src = get_str(&args, 0, "eval")?;
    let vars = PipelineVars { ctx: &*ctx, root: &root };
    expr::eval_str(&src, &vars).map_err(|e| Error::command("eval", e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
