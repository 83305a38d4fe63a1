pub mod attrs;
pub mod classes;
pub mod components;
pub mod jsx;
pub mod sanitize;
pub mod section;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Output of [`extract_primary_section`]. Both fields are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Inert fragment, safe to insert straight into a live DOM.
    pub sanitized_html: String,
    /// The selected section exactly as the model wrote it.
    pub raw_section: String,
}

/// Select the primary section of a model response and normalise it.
///
/// Never fails: odd input degrades to odd (but inert) output. Code fences are
/// tolerated, not required to be stripped first.
pub fn extract_primary_section(raw: &str) -> ExtractionResult {
    let candidate = section::select_candidate(raw);
    if candidate.text.is_empty() {
        return ExtractionResult::default();
    }
    debug!(kind = ?candidate.kind, len = candidate.text.len(), "selected candidate section");

    ExtractionResult {
        sanitized_html: normalize_markup(candidate.text),
        raw_section: candidate.text.to_string(),
    }
}

/// Four-stage pipeline: JSX artifacts → class bindings → components → sanitize.
pub fn normalize_markup(section: &str) -> String {
    let html = jsx::strip_jsx_artifacts(section);
    let html = classes::convert_class_bindings(&html);
    let html = components::rewrite_components(&html);
    sanitize::sanitize_markup(&html)
}

// ── Tests ──
