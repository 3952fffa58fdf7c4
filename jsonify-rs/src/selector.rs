//! Element selection: CSS through [`scraper`], plus an XPath subset.
//!
//! | Syntax | Dialect |
//! |--------|---------|
//! | starts with `/`, `./`, `..` or is `.` | XPath |
//! | anything else | CSS |
//!
//! Selection runs against an [`Outline`] of the context element: every
//! element numbered in document order, with its parent and its slot in the
//! parent's `children`.  Results name elements by that number.
//!
//! CSS selectors match descendant-or-self of the context element, so `p`
//! applied to a `<p>` root matches the root itself.  The tree is serialized
//! with an order marker on each element, reparsed by scraper, and matched
//! with [`scraper::Selector`]; the markers map hits back into the outline.
//!
//! XPath paths evaluate against a virtual document node whose only child is
//! the root, so `/div/p` and `//p` behave the way they would on a parsed
//! document.  Supported: child and `//` steps, `*`, `.`, `..`, `text()`,
//! `@attr`, and predicates `[n]`, `[last()]`, `[@a]`, `[@a='v']`,
//! `[contains(@a,'v')]`, applied left to right.

use std::rc::Rc;

use scraper::Html;

use crate::dom::{Content, Element};

/// Attribute carrying the outline order through a CSS reparse.
const ORDER_MARKER: &str = "data-jsonify-order";

/// One selection result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// Outline order of the element (0 is the context element).
    Element(usize),
    Text(String),
    Attr(String),
}

#[derive(Debug, Clone)]
pub enum Selector {
    Css(scraper::Selector),
    XPath(PathExpr),
}

impl Selector {
    pub fn parse(src: &str) -> Result<Self, String> {
        let src = src.trim();
        if src.is_empty() {
            return Err("empty selector".into());
        }
        if src.starts_with('/') || src.starts_with("./") || src.starts_with("..") || src == "." {
            parse_xpath(src).map(Selector::XPath)
        } else {
            scraper::Selector::parse(src)
                .map(Selector::Css)
                .map_err(|e| format!("invalid selector `{src}`: {e}"))
        }
    }

    /// Matches in document order.
    pub fn select(&self, outline: &Outline) -> Vec<Match> {
        match self {
            Selector::Css(selector) => select_css(selector, outline),
            Selector::XPath(expr) => expr.eval(outline),
        }
    }
}

// ── Outline ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Entry {
    element: Rc<Element>,
    parent: Option<usize>,
    /// Index into the parent's `children`.
    slot: usize,
    /// One past the last descendant's order.
    end: usize,
    kids: Vec<usize>,
}

/// Elements of a tree in document order.
#[derive(Debug)]
pub struct Outline {
    entries: Vec<Entry>,
}

impl Outline {
    pub fn new(root: &Rc<Element>) -> Self {
        let mut entries = vec![Entry {
            element: Rc::clone(root),
            parent: None,
            slot: 0,
            end: 1,
            kids: Vec::new(),
        }];
        // (order, next slot to visit)
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        while let Some(top) = stack.last_mut() {
            let (order, slot) = *top;
            let next = entries[order].element.children.get(slot).map(|c| match c {
                Content::Element(el) => Some(Rc::clone(el)),
                Content::Text(_) => None,
            });
            match next {
                Some(child) => {
                    top.1 += 1;
                    if let Some(element) = child {
                        let id = entries.len();
                        entries.push(Entry {
                            element,
                            parent: Some(order),
                            slot,
                            end: id + 1,
                            kids: Vec::new(),
                        });
                        entries[order].kids.push(id);
                        stack.push((id, 0));
                    }
                }
                None => {
                    entries[order].end = entries.len();
                    stack.pop();
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn root(&self) -> &Rc<Element> {
        &self.entries[0].element
    }

    pub fn element(&self, order: usize) -> Option<&Rc<Element>> {
        self.entries.get(order).map(|e| &e.element)
    }

    pub fn parent(&self, order: usize) -> Option<usize> {
        self.entries.get(order).and_then(|e| e.parent)
    }

    /// Child-index path from the root, as taken by [`Element::get`].
    pub fn path(&self, order: usize) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut cur = self.entries.get(order)?;
        while let Some(parent) = cur.parent {
            path.push(cur.slot);
            cur = &self.entries[parent];
        }
        path.reverse();
        Some(path)
    }

    /// Slot in the root's `children` when `order` is a direct child.
    pub fn root_slot(&self, order: usize) -> Option<usize> {
        self.entries
            .get(order)
            .filter(|e| e.parent == Some(0))
            .map(|e| e.slot)
    }

    fn kids(&self, order: usize) -> &[usize] {
        self.entries.get(order).map(|e| e.kids.as_slice()).unwrap_or(&[])
    }

    fn end(&self, order: usize) -> usize {
        self.entries.get(order).map_or(order, |e| e.end)
    }
}

// ── CSS ───────────────────────────────────────────────────────────────────────

fn select_css(selector: &scraper::Selector, outline: &Outline) -> Vec<Match> {
    let root = outline.root();
    let marked = root.to_marked_html(ORDER_MARKER);
    let doc = if root.tag.eq_ignore_ascii_case("html") {
        Html::parse_document(&format!("<!DOCTYPE html>{marked}"))
    } else {
        Html::parse_fragment(&marked)
    };
    let mut hits: Vec<usize> = doc
        .select(selector)
        .filter_map(|el| el.value().attr(ORDER_MARKER)?.parse::<usize>().ok())
        .filter(|&order| order < outline.len())
        .collect();
    // Reparsing may move misnested elements; report outline order.
    hits.sort_unstable();
    hits.dedup();
    hits.into_iter().map(Match::Element).collect()
}

// ── XPath ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    AnyElement,
    SelfNode,
    Parent,
    Text,
    Attr(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttr(String),
    AttrEquals(String, String),
    AttrContains(String, String),
}

impl Predicate {
    /// Keep the candidate at 0-based `index` of `len`.
    fn keeps(&self, outline: &Outline, ctx: Ctx, index: usize, len: usize) -> bool {
        let attr = |name: &str| match ctx {
            Ctx::Element(order) => outline
                .element(order)
                .and_then(|el| el.get_attr(name).map(str::to_owned)),
            Ctx::Document => None,
        };
        match self {
            Predicate::Position(n) => index + 1 == *n,
            Predicate::Last => index + 1 == len,
            Predicate::HasAttr(name) => attr(name).is_some(),
            Predicate::AttrEquals(name, v) => attr(name).as_deref() == Some(v.as_str()),
            Predicate::AttrContains(name, v) => attr(name).is_some_and(|a| a.contains(v.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    descendant: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A parsed location path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    absolute: bool,
    steps: Vec<Step>,
}

/// A point in the tree during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Ctx {
    Document,
    Element(usize),
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Split on `sep` outside brackets, parentheses, and quotes.
fn split_top_level(src: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in src.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn parse_xpath(src: &str) -> Result<PathExpr, String> {
    let (absolute, rest) = match src.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, src),
    };
    let segments = split_top_level(rest, '/');
    let mut steps = Vec::new();
    let mut descendant = false;
    for (i, seg) in segments.iter().enumerate() {
        let seg = seg.trim();
        if seg.is_empty() {
            // `//`: the next step searches descendants.
            if i + 1 == segments.len() {
                return Err(format!("path `{src}` ends with `/`"));
            }
            descendant = true;
            continue;
        }
        steps.push(parse_step(seg, descendant, src)?);
        descendant = false;
    }
    if steps.is_empty() {
        return Err(format!("empty path `{src}`"));
    }
    if let Some(pos) = steps
        .iter()
        .position(|s| matches!(s.test, NodeTest::Text | NodeTest::Attr(_)))
    {
        if pos + 1 != steps.len() {
            return Err(format!("`text()` and `@attr` must end the path `{src}`"));
        }
    }
    Ok(PathExpr { absolute, steps })
}

fn parse_step(seg: &str, descendant: bool, src: &str) -> Result<Step, String> {
    let (head, preds) = match seg.find('[') {
        Some(i) => (&seg[..i], &seg[i..]),
        None => (seg, ""),
    };
    let head = head.trim();
    let test = match head {
        "." => NodeTest::SelfNode,
        ".." => NodeTest::Parent,
        "*" | "node()" => NodeTest::AnyElement,
        "text()" => NodeTest::Text,
        _ => {
            if let Some(attr) = head.strip_prefix('@') {
                NodeTest::Attr(attr.to_owned())
            } else if !head.is_empty() && head.chars().all(is_ident_char) {
                NodeTest::Name(head.to_owned())
            } else {
                return Err(format!("unsupported step `{seg}` in `{src}`"));
            }
        }
    };

    let mut predicates = Vec::new();
    let mut rest = preds.trim();
    while !rest.is_empty() {
        let Some(body_and_rest) = rest.strip_prefix('[') else {
            return Err(format!("unexpected `{rest}` in `{src}`"));
        };
        let close = body_and_rest
            .find(']')
            .ok_or_else(|| format!("unclosed predicate in `{src}`"))?;
        predicates.push(parse_predicate(body_and_rest[..close].trim(), src)?);
        rest = body_and_rest[close + 1..].trim();
    }
    Ok(Step { descendant, test, predicates })
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    let q = s.chars().next()?;
    if (q == '\'' || q == '"') && s.len() >= 2 && s.ends_with(q) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn parse_predicate(body: &str, src: &str) -> Result<Predicate, String> {
    if let Ok(n) = body.parse::<usize>() {
        if n == 0 {
            return Err(format!("positions start at 1 in `{src}`"));
        }
        return Ok(Predicate::Position(n));
    }
    if body == "last()" {
        return Ok(Predicate::Last);
    }
    if let Some(args) = body
        .strip_prefix("contains(")
        .and_then(|r| r.strip_suffix(')'))
    {
        let (attr, needle) = args
            .split_once(',')
            .ok_or_else(|| format!("contains() takes two arguments in `{src}`"))?;
        let attr = attr
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| format!("contains() expects an attribute in `{src}`"))?;
        let needle = unquote(needle).ok_or_else(|| format!("contains() expects a string in `{src}`"))?;
        return Ok(Predicate::AttrContains(attr.to_owned(), needle.to_owned()));
    }
    if let Some(attr) = body.strip_prefix('@') {
        return Ok(match attr.split_once('=') {
            Some((name, value)) => Predicate::AttrEquals(
                name.trim().to_owned(),
                unquote(value)
                    .ok_or_else(|| format!("expected a quoted value in `{src}`"))?
                    .to_owned(),
            ),
            None => Predicate::HasAttr(attr.trim().to_owned()),
        });
    }
    Err(format!("unsupported predicate `[{body}]` in `{src}`"))
}

impl PathExpr {
    fn eval(&self, outline: &Outline) -> Vec<Match> {
        let mut current = vec![if self.absolute { Ctx::Document } else { Ctx::Element(0) }];
        for step in &self.steps {
            let contexts = if step.descendant {
                descendant_or_self(outline, &current)
            } else {
                current
            };
            match &step.test {
                NodeTest::Text => {
                    return contexts
                        .iter()
                        .filter_map(|c| element_at(outline, *c))
                        .flat_map(|el| {
                            el.children.iter().filter_map(|c| match c {
                                Content::Text(t) => Some(Match::Text(t.clone())),
                                Content::Element(_) => None,
                            })
                        })
                        .collect();
                }
                NodeTest::Attr(name) => {
                    return contexts
                        .iter()
                        .filter_map(|c| element_at(outline, *c))
                        .filter_map(|el| el.get_attr(name).map(|v| Match::Attr(v.to_owned())))
                        .collect();
                }
                _ => {}
            }
            let mut next = Vec::new();
            for ctx in &contexts {
                let mut candidates = step_candidates(outline, *ctx, &step.test);
                for predicate in &step.predicates {
                    let len = candidates.len();
                    candidates = candidates
                        .into_iter()
                        .enumerate()
                        .filter(|&(i, c)| predicate.keeps(outline, c, i, len))
                        .map(|(_, c)| c)
                        .collect();
                }
                next.extend(candidates);
            }
            next.sort_unstable();
            next.dedup();
            current = next;
        }
        current
            .into_iter()
            .filter_map(|c| match c {
                Ctx::Element(order) => Some(Match::Element(order)),
                Ctx::Document => None,
            })
            .collect()
    }
}

fn element_at(outline: &Outline, ctx: Ctx) -> Option<&Rc<Element>> {
    match ctx {
        Ctx::Document => None,
        Ctx::Element(order) => outline.element(order),
    }
}

fn step_candidates(outline: &Outline, ctx: Ctx, test: &NodeTest) -> Vec<Ctx> {
    let children = || -> Vec<usize> {
        match ctx {
            Ctx::Document => vec![0],
            Ctx::Element(order) => outline.kids(order).to_vec(),
        }
    };
    match test {
        NodeTest::SelfNode => vec![ctx],
        NodeTest::Parent => match ctx {
            Ctx::Document => Vec::new(),
            Ctx::Element(order) => vec![outline.parent(order).map_or(Ctx::Document, Ctx::Element)],
        },
        NodeTest::AnyElement => children().into_iter().map(Ctx::Element).collect(),
        NodeTest::Name(name) => children()
            .into_iter()
            .filter(|&order| outline.element(order).is_some_and(|el| el.tag.eq_ignore_ascii_case(name)))
            .map(Ctx::Element)
            .collect(),
        NodeTest::Text | NodeTest::Attr(_) => Vec::new(),
    }
}

/// Every context plus all its descendants, in document order.
///
/// Subtrees occupy contiguous order ranges, so a context inside a range
/// already taken adds nothing.
fn descendant_or_self(outline: &Outline, contexts: &[Ctx]) -> Vec<Ctx> {
    let mut sorted = contexts.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut out = Vec::new();
    let mut covered = 0usize;
    for ctx in sorted {
        match ctx {
            Ctx::Document => {
                out.push(Ctx::Document);
                out.extend((0..outline.len()).map(Ctx::Element));
                covered = outline.len();
            }
            Ctx::Element(order) if order >= covered => {
                let end = outline.end(order);
                out.extend((order..end).map(Ctx::Element));
                covered = end;
            }
            Ctx::Element(_) => {}
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    const DOC: &str = r#"<div id="main">
        <h1 class="title big">Heading</h1>
        <ul><li class="a">one</li><li>two</li><li class="a b">three</li></ul>
        <p><a href="/x" rel="next">link</a> tail</p>
    </div>"#;

    fn texts_in(html: &str, sel: &str) -> Vec<String> {
        let outline = Outline::new(&Rc::new(parse_html(html)));
        Selector::parse(sel)
            .unwrap()
            .select(&outline)
            .into_iter()
            .map(|m| match m {
                Match::Element(order) => outline.element(order).unwrap().text_content(),
                Match::Text(t) | Match::Attr(t) => t,
            })
            .collect()
    }

    fn texts(sel: &str) -> Vec<String> {
        texts_in(DOC, sel)
    }

    #[test]
    fn outline_orders_and_paths() {
        let root = Rc::new(parse_html("<div>a<p>b<i>c</i></p>d<ul><li>e</li></ul></div>"));
        let outline = Outline::new(&root);
        let tags: Vec<&str> = (0..outline.len())
            .map(|i| outline.element(i).unwrap().tag.as_str())
            .collect();
        assert_eq!(tags, vec!["div", "p", "i", "ul", "li"]);
        assert_eq!(outline.path(0), Some(vec![]));
        assert_eq!(outline.path(2), Some(vec![1, 1]));
        assert_eq!(outline.path(4), Some(vec![3, 0]));
        assert_eq!(outline.root_slot(3), Some(3));
        assert_eq!(outline.root_slot(2), None);
        assert_eq!(outline.end(1), 3);
        assert!(Rc::ptr_eq(outline.root(), &root));
    }

    #[test]
    fn css_type_and_class() {
        assert_eq!(texts("li"), vec!["one", "two", "three"]);
        assert_eq!(texts("li.a"), vec!["one", "three"]);
        assert_eq!(texts(".a.b"), vec!["three"]);
        assert_eq!(texts("h1.title"), vec!["Heading"]);
    }

    #[test]
    fn css_matches_the_context_element_itself() {
        assert_eq!(texts("div#main").len(), 1);
    }

    #[test]
    fn css_combinators() {
        assert_eq!(texts("ul > li:first-child"), vec!["one"]);
        assert_eq!(texts("div li:last-child"), vec!["three"]);
        assert_eq!(texts("ul li:nth-child(2)"), vec!["two"]);
        assert_eq!(texts("li.a + li"), vec!["two"]);
        assert_eq!(texts("li:not(.a)"), vec!["two"]);
        assert!(texts("div > li").is_empty());
    }

    #[test]
    fn css_attributes_and_groups() {
        assert_eq!(texts("a[rel=next]"), vec!["link"]);
        assert_eq!(texts("a[href^='/']"), vec!["link"]);
        assert_eq!(texts("h1, a"), vec!["Heading", "link"]);
    }

    #[test]
    fn css_on_full_documents() {
        let doc = "<!DOCTYPE html><html><head><title>T</title></head><body><p>x</p></body></html>";
        assert_eq!(texts_in(doc, "body > p"), vec!["x"]);
        assert_eq!(texts_in(doc, "title"), vec!["T"]);
    }

    #[test]
    fn xpath_paths() {
        assert_eq!(texts("//li"), vec!["one", "two", "three"]);
        assert_eq!(texts("/div/ul/li[2]"), vec!["two"]);
        assert_eq!(texts("./ul/li[last()]"), vec!["three"]);
        assert_eq!(texts("//li[@class='a']"), vec!["one"]);
        assert_eq!(texts("//li[contains(@class,'b')]"), vec!["three"]);
    }

    #[test]
    fn xpath_predicates_apply_in_order() {
        let html = r#"<ul><li class="a">1</li><li class="b">2</li><li class="a">3</li></ul>"#;
        assert!(texts_in(html, r#"//li[2][@class="a"]"#).is_empty());
        assert_eq!(texts_in(html, r#"//li[@class="a"][2]"#), vec!["3"]);
        assert_eq!(texts_in(html, r#"//li[@class="a"][last()]"#), vec!["3"]);
        assert_eq!(texts_in(html, "//li[3][@class='a']"), vec!["3"]);
    }

    #[test]
    fn xpath_text_and_attributes() {
        assert_eq!(texts("//a/@href"), vec!["/x"]);
        assert_eq!(texts("//h1/text()"), vec!["Heading"]);
    }

    #[test]
    fn xpath_parent_step() {
        assert_eq!(texts("//a/.."), vec!["link tail"]);
    }

    #[test]
    fn deep_trees_select_without_recursion() {
        let depth = 20_000;
        let html = format!("{}<span>x</span>{}", "<div>".repeat(depth), "</div>".repeat(depth));
        assert_eq!(texts_in(&html, "span"), vec!["x"]);
        assert_eq!(texts_in(&html, "//span"), vec!["x"]);
        assert_eq!(texts_in(&html, "//div//span"), vec!["x"]);
        let outline = Outline::new(&Rc::new(parse_html(&html)));
        assert_eq!(Selector::parse("div").unwrap().select(&outline).len(), depth);
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(Selector::parse("li >").is_err());
        assert!(Selector::parse("//li/text()/b").is_err());
        assert!(Selector::parse("li[").is_err());
        assert!(Selector::parse("").is_err());
    }
}
