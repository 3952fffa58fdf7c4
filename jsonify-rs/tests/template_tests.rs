use jsonify::{Engine, ErrorKind, Template, Value};
use serde_json::json;

const ARTICLE: &str = r#"<html><body>
<article id="post">
  <h1>News</h1>
  <div class="author"><span class="name">Ada</span> <a href="/ada" rel="me">profile</a></div>
  <ul><li>1</li><li>2</li><li>3</li></ul>
  <p class="body">First <b>bold</b> paragraph.</p>
</article>
</body></html>"#;

fn render(template: &str, html: &str) -> serde_json::Value {
    let t = Template::from_yaml_str(template).unwrap();
    Engine::new().render_json(&t, html).unwrap()
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn text_of_root() {
    let t = Template::from_json_str(r#"{"String name": [["text"]]}"#).unwrap();
    let out = Engine::new().render_json(&t, "<p>Hello</p>").unwrap();
    assert_eq!(out, json!({"name": "Hello"}));
}

#[test]
fn integer_list_from_text_nodes() {
    let out = render("List[Integer] nums: [[select, \"//li/text()\"]]", ARTICLE);
    assert_eq!(out, json!({"nums": [1, 2, 3]}));
}

#[test]
fn missing_variable_is_undefined_not_an_error() {
    let t = Template::from_yaml_str(
        r#"
String s: [get(x), "default($missing)"]
Any a: [get(x), "default($missing)"]
Integer i: [get(x), "default($missing)"]
"#,
    )
    .unwrap();
    let out = Engine::new().render_json(&t, "<p></p>").unwrap();
    assert_eq!(out, json!({"s": "", "a": null, "i": 0}));
}

#[test]
fn unbalanced_quote_is_a_parse_error() {
    let err = Template::from_yaml_str(r#"String x: ['f("a, "b")']"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.path(), Some("x"));
}

#[test]
fn output_keeps_declaration_order() {
    let out = render("String z: [text]\nString a: [text]\nString m: [text]\n", "<p>x</p>");
    let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "a", "m"]);
}

#[test]
fn child_scope_mutation_is_isolated() {
    let mut t = Template::from_yaml_str(
        r#"
$v: 1
Integer a: [get(v)]
Integer b: [get(v)]
"#,
    )
    .unwrap();
    t.root_mut()
        .child_mut("a")
        .unwrap()
        .scope
        .variables
        .insert("v".into(), Value::Int(2));
    assert_eq!(t.root().child("b").unwrap().scope.variables["v"], Value::Int(1));
    assert_eq!(t.root().scope.variables["v"], Value::Int(1));
    let out = Engine::new().render_json(&t, "<p></p>").unwrap();
    assert_eq!(out, json!({"a": 2, "b": 1}));
}

#[test]
fn sibling_roots_are_independent() {
    let out = render(
        r#"
Html stripped: [remove(b), select_one(p), html]
Html original: [select_one(p), html]
"#,
        ARTICLE,
    );
    assert_eq!(out["stripped"], r#"<p class="body">First  paragraph.</p>"#);
    assert_eq!(out["original"], r#"<p class="body">First <b>bold</b> paragraph.</p>"#);
}

// ── Language features ─────────────────────────────────────────────────────────

#[test]
fn nested_objects_and_init() {
    let out = render(
        r#"
init(): [select_one(article)]
String id: [attr(id)]
Object author:
  init(): [select_one(.author)]
  String name: [select_one(.name), text]
  String url: [select_one(a), attr(href)]
Map[String, String] link: [select_one(.author a)]
"#,
        ARTICLE,
    );
    assert_eq!(
        out,
        json!({
            "id": "post",
            "author": {"name": "Ada", "url": "/ada"},
            "link": {"href": "/ada", "rel": "me"}
        })
    );
}

#[test]
fn user_functions_with_parameters() {
    let out = render(
        r#"
pick(sel, name): [select_one($sel), attr($name)]
String href: ["pick(a, href)"]
String rel: ["pick(sel=a, name=rel)"]
"#,
        ARTICLE,
    );
    assert_eq!(out, json!({"href": "/ada", "rel": "me"}));
}

#[test]
fn user_function_shadows_builtin() {
    let out = render("text(): [inner_text, upper]\nString t: [select_one(p), text]\n", ARTICLE);
    assert_eq!(out["t"], "FIRST BOLD PARAGRAPH.");
}

#[test]
fn nested_calls_see_current_root() {
    let out = render(
        r#"String t: [select_one(h1), text, "concat_str(post, '-', upper())"]"#,
        ARTICLE,
    );
    assert_eq!(out["t"], "News-NEWS");
}

#[test]
fn lambdas_and_templates_in_foreach() {
    let out = render(
        r#"
List[String] items: [select(li), "map((x) -> text())"]
List[Object] rows: [select(li), "foreach(template={Integer n: [text]})"]
Object first: [select_one(li), "apply(template={String t: [text]})"]
"#,
        ARTICLE,
    );
    assert_eq!(out["items"], json!(["1", "2", "3"]));
    assert_eq!(out["rows"], json!([{"n": 1}, {"n": 2}, {"n": 3}]));
    assert_eq!(out["first"], json!({"t": "1"}));
}

#[test]
fn list_form_lines_with_keywords() {
    let out = render(
        r#"
Html cleaned: [[select_one, a], [clean, {safe_attrs_only: false}], [html]]
"#,
        ARTICLE,
    );
    assert_eq!(out["cleaned"], r#"<a href="/ada" rel="me">profile</a>"#);
}

#[test]
fn regex_and_eval() {
    let out = render(
        r#"
String word: [select_one(p), inner_text, "regex('(\\w+)\\.', search, 1)"]
Integer total: [select(li), len, "eval($root * 10 + 1)"]
"#,
        ARTICLE,
    );
    assert_eq!(out, json!({"word": "paragraph", "total": 31}));
}

#[test]
fn fixed_width_and_radix() {
    let out = render(
        r#"
UInt8 byte: [get(x), "default(0x1ff)"]
Int8 signed: [get(x), "default('0xff')"]
Float16 half: [get(x), "default(0.1)"]
"#,
        "<p></p>",
    );
    assert_eq!(out["byte"], 255);
    assert_eq!(out["signed"], -1);
    assert_eq!(out["half"], 0.0999755859375);
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[test]
fn unknown_command_reports_path() {
    let t = Template::from_yaml_str("Object a:\n  String b: [nope]\n").unwrap();
    let err = Engine::new().render(&t, "<p></p>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandNotFound);
    assert_eq!(err.path(), Some("a.b"));
}

#[test]
fn too_many_arguments() {
    let t = Template::from_yaml_str("f(a): [text]\nString x: [\"f(1, 2)\"]\n").unwrap();
    let err = Engine::new().render(&t, "<p></p>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentBinding);
}

#[test]
fn failed_conversion() {
    let t = Template::from_yaml_str("Integer n: [select_one(h1), text]").unwrap();
    let err = Engine::new().render(&t, ARTICLE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeConversion);
    assert_eq!(err.path(), Some("n"));
}

// ── Frames and variables ──────────────────────────────────────────────────────

#[test]
fn parameters_reach_nested_calls() {
    let out = render(
        r#"
f(v): ["concat_str(post, '', concat_str(post, '', $v))"]
String t: [text, "f(X)"]
"#,
        "<p>r</p>",
    );
    assert_eq!(out, json!({"t": "rrX"}));
}

#[test]
fn parameters_reach_lambdas() {
    let out = render(
        r#"
suffixed(v): [select(li), "map((x) -> text())", "map((x) -> concat_str(post, '-', $v))"]
List[String] items: ["suffixed(n)"]
"#,
        ARTICLE,
    );
    assert_eq!(out, json!({"items": ["1-n", "2-n", "3-n"]}));
}

#[test]
fn eval_sees_function_parameters() {
    let out = render("g(n): [\"eval('$n + 1')\"]\nInteger t: [\"g(41)\"]\n", "<p></p>");
    assert_eq!(out, json!({"t": 42}));
}

#[test]
fn mapping_variable_renders_as_object() {
    let out = render(
        r#"
$card:
  String name: [select_one(.name), text]
  String link: [select_one(a), attr(href)]
Object author: [select_one(.author), get(card)]
"#,
        ARTICLE,
    );
    assert_eq!(out, json!({"author": {"name": "Ada", "link": "/ada"}}));
}

#[test]
fn mapping_variable_is_checked_at_build_time() {
    let err = Template::from_yaml_str("$meta:\n  Bogus x: [text]\nString y: [text]\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

// ── Limits ────────────────────────────────────────────────────────────────────

#[test]
fn deeply_nested_documents() {
    let depth = 20_000;
    let html = format!("{}<span>deep</span>{}", "<div>".repeat(depth), "</div>".repeat(depth));
    let out = render(
        "Integer divs: [select(div), len]\nString leaf: [select_one(span), text]\nString xpath: [select_one(\"//div/span\"), text]\n",
        &html,
    );
    assert_eq!(out, json!({"divs": depth, "leaf": "deep", "xpath": "deep"}));
}

#[test]
fn eval_integer_overflow_is_a_command_error() {
    let t = Template::from_yaml_str("Integer x: [text, \"eval('int($root) % -1')\"]\n").unwrap();
    let err = Engine::new()
        .render(&t, "<p>-170141183460469231731687303715884105728</p>")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Command);
    assert_eq!(err.path(), Some("x"));

    let t = Template::from_yaml_str("Integer x: [text, \"eval('-int($root)')\"]\n").unwrap();
    let err = Engine::new()
        .render(&t, "<p>-170141183460469231731687303715884105728</p>")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Command);
}
