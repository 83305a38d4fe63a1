use std::sync::LazyLock;

use regex::{Captures, Regex};

static SCRIPT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap());
// An opening <script with no matching close: drop it and everything after.
static SCRIPT_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<script.*\z").unwrap());
// Attribute boundary is whitespace, `/`, or a closing quote glued to the next
// attribute (`title="x"onclick=...`). The quote is group 1 and is put back.
static EVENT_HANDLER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:[\s/]+|(["']))on[a-z0-9_:-]+\s*=\s*(?:"[^"]*"|'[^']*'|\{[^}]*\}\}?|[^\s>]+)?"#,
    )
    .unwrap()
});
static STYLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:[\s/]+|(["']))style\s*=\s*(?:"[^"]*"|'[^']*'|\{\{[^}]*\}\}|\{[^}]*\}|[^\s>]+)?"#,
    )
    .unwrap()
});

/// Strip anything that could execute or restyle the host page when the
/// fragment is inserted into a live DOM: script blocks, `on*` handlers and
/// inline `style` attributes, in quoted, braced or bare form.
///
/// Runs to a fixed point, so removals that splice a new match together are
/// caught and a second call is a no-op.
pub fn sanitize_markup(html: &str) -> String {
    let mut current = html.to_string();
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_once(html: &str) -> String {
    let out = SCRIPT_BLOCK_RE.replace_all(html, "");
    let out = SCRIPT_TAIL_RE.replace_all(&out, "");
    let out = EVENT_HANDLER_RE.replace_all(&out, keep_quote);
    STYLE_ATTR_RE.replace_all(&out, keep_quote).into_owned()
}

fn keep_quote(caps: &Captures) -> String {
    caps.get(1).map_or("", |m| m.as_str()).to_string()
}

// ── Tests ──
