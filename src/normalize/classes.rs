use std::sync::LazyLock;

use regex::{Captures, Regex};

static CLASS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s)className(\s*=)").unwrap());
static TEMPLATE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s*=\s*\{\s*`([^`{}]*)`\s*\}").unwrap());
static DOUBLE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bclass\s*=\s*\{\s*"([^"]*)"\s*\}"#).unwrap());
static SINGLE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s*=\s*\{\s*'([^']*)'\s*\}").unwrap());
static EXPR_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s*=\s*\{([^}]*)\}").unwrap());

/// Normalise every class binding form into a literal `class="..."`.
pub fn convert_class_bindings(html: &str) -> String {
    let out = CLASS_NAME_RE.replace_all(html, "${1}class${2}");
    let out = TEMPLATE_CLASS_RE.replace_all(&out, quoted);
    let out = DOUBLE_CLASS_RE.replace_all(&out, quoted);
    let out = SINGLE_CLASS_RE.replace_all(&out, quoted);
    EXPR_CLASS_RE
        .replace_all(&out, |caps: &Captures| {
            format!(r#"class="{}""#, flatten_class_expression(&caps[1]))
        })
        .into_owned()
}

fn quoted(caps: &Captures) -> String {
    format!(r#"class="{}""#, &caps[1])
}

/// Best-effort flatten of an expression-valued class list. Conditionals are
/// not evaluated; whatever identifier-like fragments survive are kept.
pub fn flatten_class_expression(expr: &str) -> String {
    expr.split(|c: char| c.is_whitespace() || c == '+' || c == '|')
        .map(|token| token.replace(['"', '\'', '`'], ""))
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ──
