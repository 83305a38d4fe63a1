use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use html_escape::encode_double_quoted_attribute;

use crate::db::VariantRow;
use crate::runs::frame_document;

const PAGE_STYLE: &str = "\
body { font-family: system-ui, sans-serif; margin: 0; background: #f4f4f5; }
header { padding: 16px 24px; background: #18181b; color: #fafafa; }
.columns { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; padding: 16px; }
.column { background: #fff; border-radius: 8px; padding: 12px; }
.hero-preview { border: 1px dashed #a1a1aa; padding: 12px; margin-bottom: 12px; overflow: hidden; }
iframe { width: 100%; height: 720px; border: 1px solid #e4e4e7; }
footer { padding: 16px 24px; }
code { background: #e4e4e7; padding: 2px 6px; border-radius: 4px; }";

/// Blind A/B page for one pair. Model names are never written out.
///
/// The hero preview receives the sanitised fragment verbatim; the full
/// response goes into a sandboxed frame with scripts and same-origin disabled.
pub fn render_comparison(pair_id: i64, left: &VariantRow, right: &VariantRow) -> String {
    format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<title>Pair #{pair_id}</title>
<style>
{PAGE_STYLE}
</style>
</head>
<body>
<header><strong>Landing page arena</strong> &middot; pair #{pair_id}</header>
<div class=\"columns\">
{a}
{b}
</div>
<footer>
<p>Vote with <code>landing_arena vote {pair_id} left</code>, <code>right</code> or <code>tie</code>.</p>
</footer>
</body>
</html>
",
        a = render_column("A", left),
        b = render_column("B", right),
    )
}

fn render_column(label: &str, variant: &VariantRow) -> String {
    format!(
        "<section class=\"column\">
<h2>{label}</h2>
<div class=\"hero-preview\">{hero}</div>
<iframe sandbox=\"\" referrerpolicy=\"no-referrer\" srcdoc=\"{doc}\"></iframe>
</section>",
        hero = variant.sanitized_html,
        doc = encode_double_quoted_attribute(&frame_document(&variant.raw_text)),
    )
}

pub fn write_page(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write {:?}", path))
}

// ── Tests ──
