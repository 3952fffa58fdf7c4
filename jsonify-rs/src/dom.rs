//! Owned HTML tree.
//!
//! Documents are parsed once with [`scraper`] (html5ever underneath) and
//! copied into a plain owned tree.  Child elements sit behind [`Rc`], so a
//! selection shares its subtree with the document it came from; editing
//! goes through [`Rc::make_mut`] and copies only the nodes on the edited
//! path.
//!
//! Text that follows a child element in the same parent (lxml's "tail") is a
//! sibling [`Content::Text`].  Removing an element keeps that text by merging
//! it into the preceding text run.
//!
//! Every walk over the tree (parsing, text, serialization, cleaning, drop)
//! keeps its own stack, so nesting depth is bounded by memory rather than by
//! the thread's call stack.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use scraper::{ElementRef, Html, Node};

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Element(Rc<Element>),
}

/// An HTML element with attributes sorted by name.
#[derive(Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Content>,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Content::Element(Rc::new(child)));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        push_text(&mut self.children, &text.into());
        self
    }

    // ── Attributes ────────────────────────────────────────────────────────────

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        self.attrs.len() != before
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    pub fn child_elements(&self) -> impl Iterator<Item = &Rc<Element>> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(el) => Some(el),
            Content::Text(_) => None,
        })
    }

    /// Element at `path`, where each step indexes `children`.
    pub fn get(&self, path: &[usize]) -> Option<&Element> {
        let mut cur = self;
        for &i in path {
            match cur.children.get(i)? {
                Content::Element(el) => cur = el,
                Content::Text(_) => return None,
            }
        }
        Some(cur)
    }

    /// Mutable element at `path`; shared nodes along the way are copied.
    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut cur = self;
        for &i in path {
            match cur.children.get_mut(i)? {
                Content::Element(el) => cur = Rc::make_mut(el),
                Content::Text(_) => return None,
            }
        }
        Some(cur)
    }

    /// Detach the element at `path`, keeping the text that followed it.
    ///
    /// The root (empty path) cannot be removed.
    pub fn remove_at(&mut self, path: &[usize]) -> Option<Rc<Element>> {
        let (&last, parent_path) = path.split_last()?;
        let parent = self.get_mut(parent_path)?;
        if !matches!(parent.children.get(last), Some(Content::Element(_))) {
            return None;
        }
        let Content::Element(removed) = parent.children.remove(last) else {
            return None;
        };
        merge_text_runs(&mut parent.children);
        Some(removed)
    }

    // ── Text ──────────────────────────────────────────────────────────────────

    /// The run of text before the first child element.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Content::Text(t) => out.push_str(t),
                Content::Element(_) => break,
            }
        }
        out
    }

    /// All descendant text, concatenated in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self.children.iter()];
        while let Some(children) = stack.last_mut() {
            match children.next() {
                Some(Content::Text(t)) => out.push_str(t),
                Some(Content::Element(el)) => stack.push(el.children.iter()),
                None => {
                    stack.pop();
                }
            }
        }
        out
    }

    // ── Serialization ─────────────────────────────────────────────────────────

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        self.serialize(&mut out, false, None);
        out
    }

    pub fn write_html(&self, out: &mut String) {
        self.serialize(out, true, None);
    }

    /// Serialize with `marker="N"` on every element, where `N` counts
    /// elements in document order starting from this one at 0.
    pub(crate) fn to_marked_html(&self, marker: &str) -> String {
        let mut out = String::new();
        self.serialize(&mut out, true, Some(marker));
        out
    }

    fn serialize(&self, out: &mut String, outer: bool, marker: Option<&str>) {
        let mut order = 0usize;
        if outer && !open_tag(self, out, marker, &mut order) {
            return;
        }
        if !outer {
            order += 1;
        }
        let mut stack: Vec<(&Element, std::slice::Iter<'_, Content>)> = vec![(self, self.children.iter())];
        while let Some((el, children)) = stack.last_mut() {
            let el: &Element = *el;
            match children.next() {
                Some(Content::Text(t)) if RAW_TEXT_TAGS.contains(&el.tag.as_str()) => out.push_str(t),
                Some(Content::Text(t)) => out.push_str(&escape_text(t)),
                Some(Content::Element(child)) => {
                    if open_tag(child, out, marker, &mut order) {
                        stack.push((&**child, child.children.iter()));
                    }
                }
                None => {
                    stack.pop();
                    if outer || !stack.is_empty() {
                        out.push_str("</");
                        out.push_str(&el.tag);
                        out.push('>');
                    }
                }
            }
        }
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    /// Remove unwanted tags and attributes in place.
    pub fn clean(&mut self, opts: &CleanOptions) {
        let kill = opts.kill_set();
        let unwrap = opts.unwrap_set();
        let mut stack: Vec<&mut Element> = vec![self];
        while let Some(el) = stack.pop() {
            el.clean_attrs(opts);
            el.clean_children(&kill, &unwrap);
            for child in el.children.iter_mut() {
                if let Content::Element(child) = child {
                    stack.push(Rc::make_mut(child));
                }
            }
        }
    }

    fn clean_attrs(&mut self, opts: &CleanOptions) {
        if opts.javascript {
            self.attrs.retain(|(name, value)| {
                let lowered = value.trim_start().to_ascii_lowercase();
                !name.starts_with("on") && !lowered.starts_with("javascript:")
            });
        }
        if opts.style {
            self.remove_attr("style");
        }
        if opts.safe_attrs_only {
            self.attrs.retain(|(name, _)| SAFE_ATTRS.contains(&name.as_str()));
        }
    }

    /// Drop killed children and splice unwrapped ones into this level.
    fn clean_children(&mut self, kill: &[String], unwrap: &[String]) {
        let mut pending: VecDeque<Content> = std::mem::take(&mut self.children).into();
        while let Some(child) = pending.pop_front() {
            match child {
                Content::Text(t) => push_text(&mut self.children, &t),
                Content::Element(el) if kill.contains(&el.tag) => {}
                Content::Element(el) if unwrap.contains(&el.tag) => {
                    for grandchild in el.children.iter().rev() {
                        pending.push_front(grandchild.clone());
                    }
                }
                other => self.children.push(other),
            }
        }
    }

    /// Drop line breaks and tabs from text, then collapse whitespace runs.
    pub fn minify(&mut self, line_break: bool, tab: bool, quoted: bool) {
        let mut stack: Vec<&mut Element> = vec![self];
        while let Some(el) = stack.pop() {
            for child in el.children.iter_mut() {
                match child {
                    Content::Text(t) => *t = minify_text(t, line_break, tab, quoted),
                    Content::Element(child) => stack.push(Rc::make_mut(child)),
                }
            }
        }
    }
}

/// Write the start tag; false when the element has no body to descend into.
fn open_tag(el: &Element, out: &mut String, marker: Option<&str>, order: &mut usize) -> bool {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    if let Some(marker) = marker {
        out.push(' ');
        out.push_str(marker);
        out.push_str("=\"");
        out.push_str(&order.to_string());
        out.push('"');
    }
    *order += 1;
    out.push('>');
    !(VOID_TAGS.contains(&el.tag.as_str()) && el.children.is_empty())
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.tag != b.tag || a.attrs != b.attrs || a.children.len() != b.children.len() {
                return false;
            }
            for pair in a.children.iter().zip(&b.children) {
                match pair {
                    (Content::Text(x), Content::Text(y)) if x == y => {}
                    (Content::Element(x), Content::Element(y)) => {
                        if !Rc::ptr_eq(x, y) {
                            stack.push((&**x, &**y));
                        }
                    }
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Element").field(&self.to_html()).finish()
    }
}

impl Drop for Element {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Content::Element(el) = child {
                if let Ok(mut el) = Rc::try_unwrap(el) {
                    pending.append(&mut el.children);
                }
            }
        }
    }
}

fn minify_text(text: &str, line_break: bool, tab: bool, quoted: bool) -> String {
    let stripped: String = text
        .chars()
        .filter(|&c| {
            !(line_break && c == '\n'
                || tab && c == '\t'
                || quoted && matches!(c, '\t' | '\n' | '\r' | '\u{a0}'))
        })
        .collect();
    let mut out = String::with_capacity(stripped.len());
    let mut chars = stripped.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

fn push_text(children: &mut Vec<Content>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Content::Text(prev)) = children.last_mut() {
        prev.push_str(text);
    } else {
        children.push(Content::Text(text.to_owned()));
    }
}

fn merge_text_runs(children: &mut Vec<Content>) {
    let old = std::mem::take(children);
    for child in old {
        match child {
            Content::Text(t) => push_text(children, &t),
            el => children.push(el),
        }
    }
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

// ── Cleaning options ──────────────────────────────────────────────────────────

/// Attributes kept when `safe_attrs_only` is set.
const SAFE_ATTRS: &[&str] = &[
    "abbr", "accept", "accept-charset", "accesskey", "action", "align", "alt", "axis",
    "border", "cellpadding", "cellspacing", "char", "charoff", "charset", "checked", "cite",
    "class", "clear", "color", "cols", "colspan", "compact", "coords", "datetime", "dir",
    "disabled", "enctype", "for", "frame", "headers", "height", "href", "hreflang", "hspace",
    "id", "ismap", "label", "lang", "longdesc", "maxlength", "media", "method", "multiple",
    "name", "nohref", "noshade", "nowrap", "prompt", "readonly", "rel", "rev", "rows",
    "rowspan", "rules", "scope", "selected", "shape", "size", "span", "src", "start",
    "summary", "tabindex", "target", "title", "type", "usemap", "valign", "value", "vspace",
    "width",
];

/// What [`Element::clean`] strips.
///
/// "Kill" removes an element with everything inside it; "unwrap" removes
/// only the tag and keeps its children in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanOptions {
    pub scripts: bool,
    /// Comments never survive parsing; kept for option-set compatibility.
    pub comments: bool,
    /// `on*` handlers and `javascript:` URLs.
    pub javascript: bool,
    pub style: bool,
    pub links: bool,
    pub meta: bool,
    pub embedded: bool,
    pub frames: bool,
    pub forms: bool,
    pub annoying_tags: bool,
    pub safe_attrs_only: bool,
    pub kill_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            scripts: true,
            comments: true,
            javascript: true,
            style: false,
            links: true,
            meta: true,
            embedded: true,
            frames: true,
            forms: true,
            annoying_tags: true,
            safe_attrs_only: true,
            kill_tags: Vec::new(),
            remove_tags: Vec::new(),
        }
    }
}

impl CleanOptions {
    /// Override a single option by name.
    pub fn set(&mut self, name: &str, value: &crate::Value) -> Result<(), String> {
        let flag = value.as_bool();
        match name {
            "scripts" => self.scripts = flag,
            "comments" => self.comments = flag,
            "javascript" => self.javascript = flag,
            "style" => self.style = flag,
            "links" => self.links = flag,
            "meta" => self.meta = flag,
            "embedded" => self.embedded = flag,
            "frames" => self.frames = flag,
            "forms" => self.forms = flag,
            "annoying_tags" => self.annoying_tags = flag,
            "safe_attrs_only" => self.safe_attrs_only = flag,
            "kill_tags" => self.kill_tags = tag_list(value)?,
            "remove_tags" => self.remove_tags = tag_list(value)?,
            other => return Err(format!("unknown clean option `{other}`")),
        }
        Ok(())
    }

    fn kill_set(&self) -> Vec<String> {
        let mut tags: Vec<&str> = Vec::new();
        if self.scripts {
            tags.push("script");
        }
        if self.style {
            tags.push("style");
        }
        if self.links {
            tags.push("link");
        }
        if self.meta {
            tags.push("meta");
        }
        if self.embedded {
            tags.extend(["applet", "embed", "object", "param"]);
        }
        if self.frames {
            tags.extend(["frame", "frameset", "iframe"]);
        }
        if self.forms {
            tags.extend(["button", "input", "select", "textarea"]);
        }
        let mut out: Vec<String> = tags.into_iter().map(str::to_owned).collect();
        out.extend(self.kill_tags.iter().cloned());
        out
    }

    fn unwrap_set(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.forms {
            out.push("form".to_owned());
        }
        if self.annoying_tags {
            out.extend(["blink".to_owned(), "marquee".to_owned()]);
        }
        out.extend(self.remove_tags.iter().cloned());
        out
    }
}

fn tag_list(value: &crate::Value) -> Result<Vec<String>, String> {
    match value {
        crate::Value::Str(s) => Ok(s.split_whitespace().map(str::to_owned).collect()),
        other => Ok(other.items()?.iter().map(|v| v.as_str()).collect()),
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse HTML into an owned tree.
///
/// Full documents (starting with a doctype or `<html>`) produce the `html`
/// element.  Fragments with a single top-level element produce that element;
/// anything else is wrapped in a `div`.  Comments and processing
/// instructions are dropped.
pub fn parse_html(src: &str) -> Element {
    let head: String = src
        .trim_start()
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.starts_with("<!doctype") || head.starts_with("<html") {
        let doc = Html::parse_document(src);
        return convert(doc.root_element());
    }

    let fragment = Html::parse_fragment(src);
    let mut wrapper = convert(fragment.root_element());
    let only_blank_text = wrapper
        .children
        .iter()
        .all(|c| !matches!(c, Content::Text(t) if !t.trim().is_empty()));
    if only_blank_text && wrapper.child_elements().count() == 1 {
        let only = wrapper.child_elements().next().cloned();
        if let Some(el) = only {
            drop(wrapper);
            return Rc::unwrap_or_clone(el);
        }
    }
    wrapper.tag = "div".to_owned();
    wrapper.attrs.clear();
    wrapper
}

fn shallow(value: &scraper::node::Element) -> Element {
    let mut out = Element::new(value.name());
    out.attrs = value
        .attrs()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    // Parser attribute order is unspecified.
    out.attrs.sort();
    out
}

fn convert(root: ElementRef<'_>) -> Element {
    let mut stack = vec![(shallow(root.value()), root.children())];
    while let Some((out, children)) = stack.last_mut() {
        match children.next() {
            Some(child) => match child.value() {
                Node::Text(text) => push_text(&mut out.children, text),
                Node::Element(value) => stack.push((shallow(value), child.children())),
                _ => {}
            },
            None => {
                let Some((done, _)) = stack.pop() else { break };
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(Content::Element(Rc::new(done))),
                    None => return done,
                }
            }
        }
    }
    Element::default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
