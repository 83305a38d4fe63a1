use std::sync::LazyLock;

use regex::Regex;

static HERO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<(?i:section)(?:\s[^>]*)?\s(?i:id)\s*=\s*(?:"hero"|'hero')[^>]*>.*?</(?i:section)\s*>"#,
    )
    .unwrap()
});
static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<main(?:\s[^>]*)?>.*?</main\s*>").unwrap());

/// Which rule picked the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Hero,
    Main,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSection<'a> {
    pub kind: CandidateKind,
    pub text: &'a str,
}

/// Pick the part of a response worth rendering: the `id="hero"` section,
/// else the first `<main>`, else the whole response trimmed.
pub fn select_candidate(raw: &str) -> CandidateSection<'_> {
    if let Some(m) = HERO_RE.find(raw) {
        return CandidateSection {
            kind: CandidateKind::Hero,
            text: m.as_str(),
        };
    }
    if let Some(m) = MAIN_RE.find(raw) {
        return CandidateSection {
            kind: CandidateKind::Main,
            text: m.as_str(),
        };
    }
    CandidateSection {
        kind: CandidateKind::Document,
        text: raw.trim(),
    }
}

// ── Tests ──
