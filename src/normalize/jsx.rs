use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Class carried by the `<div>` that replaces a `<>` fragment.
pub const FRAGMENT_CLASS: &str = "arena-fragment";

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\s*/\*.*?\*/\s*\}").unwrap());
static EMPTY_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*(?:"\s*"|'\s*'|`\s*`)\s*\}"#).unwrap());
static LITERAL_EXPR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*(?:`([^`{}]*)`|"([^"{}]*)"|'([^'{}]*)')\s*\}"#).unwrap()
});
static FRAGMENT_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\s*>").unwrap());
static FRAGMENT_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\s*/\s*>").unwrap());

/// Remove templating artifacts that mean nothing in literal HTML.
///
/// Literal expressions are inlined as text in child position and as a quoted
/// value in attribute position (`href={"/x"}` becomes `href="/x"`). Nested
/// braces are not understood and stay verbatim.
pub fn strip_jsx_artifacts(html: &str) -> String {
    let out = BLOCK_COMMENT_RE.replace_all(html, "");
    let out = inline_literals(&EMPTY_STRING_RE, &out, |_| "", |_| " ".to_string());
    let out = inline_literals(&LITERAL_EXPR_RE, &out, literal_text, |text| text.to_string());
    let out = FRAGMENT_OPEN_RE.replace_all(&out, format!(r#"<div class="{FRAGMENT_CLASS}">"#));
    FRAGMENT_CLOSE_RE.replace_all(&out, "</div>").into_owned()
}

fn literal_text<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
}

/// Replace every match of `re` with its literal text. A match directly after
/// `=` is an attribute value and is re-emitted quoted; anything else goes
/// through `child`.
fn inline_literals<'t, L, C>(re: &Regex, text: &'t str, literal: L, child: C) -> String
where
    L: Fn(&Captures<'t>) -> &'t str,
    C: Fn(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&text[last..m.start()]);
        let value = literal(&caps);
        if text[..m.start()].trim_end().ends_with('=') {
            out.push_str(&quote_attribute(value));
        } else {
            out.push_str(&child(value));
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Quote an attribute value, switching to single quotes when the value holds
/// double quotes and escaping only when it holds both.
fn quote_attribute(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{value}\"")
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        format!("\"{}\"", value.replace('"', "&quot;"))
    }
}

// ── Tests ──
