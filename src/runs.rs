use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::VariantRow;
use crate::error::ArenaError;
use crate::normalize;

const MANIFEST_FILE: &str = "manifest.json";

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static OPEN_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*```[A-Za-z0-9_+-]*[ \t]*\r?\n").unwrap());
static CLOSE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*```\s*\z").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub prompt: String,
    pub entries: Vec<ManifestEntry>,
}

/// One model's outcome within a run. `file` is set only on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub model: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A stored response waiting to be indexed.
#[derive(Debug, Clone)]
pub struct RawVariant {
    pub id: String,
    pub run_id: String,
    pub model: String,
    pub raw_text: String,
}

pub fn new_run_id(now: DateTime<Utc>) -> String {
    now.format("run-%Y%m%d-%H%M%S").to_string()
}

/// `OpenAI/GPT-4o` → `openai-gpt-4o`.
pub fn model_slug(model: &str) -> String {
    SLUG_RE
        .replace_all(&model.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Stable across reloads, so loading a run twice replaces rather than duplicates.
pub fn variant_id(run_id: &str, slug: &str) -> String {
    format!("{}/{}", run_id, slug)
}

/// Document for the sandboxed frame: the response minus one surrounding code fence.
pub fn frame_document(raw: &str) -> String {
    let without_open = OPEN_FENCE_RE.replace(raw, "");
    if without_open.len() == raw.len() {
        return raw.to_string();
    }
    CLOSE_FENCE_RE.replace(&without_open, "").into_owned()
}

/// Run the normaliser over one stored response.
pub fn index_variant(raw: &RawVariant) -> VariantRow {
    let extracted = normalize::extract_primary_section(&raw.raw_text);
    VariantRow {
        id: raw.id.clone(),
        run_id: raw.run_id.clone(),
        model: raw.model.clone(),
        raw_text: raw.raw_text.clone(),
        raw_section: extracted.raw_section,
        sanitized_html: extracted.sanitized_html,
    }
}

/// Directory tree of runs: `<root>/<run_id>/manifest.json` + one file per model.
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RunStore { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Save a raw response verbatim; returns the file name relative to the run dir.
    pub fn write_response(&self, run_id: &str, slug: &str, text: &str) -> Result<String> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        let file = format!("{}.txt", slug);
        let path = dir.join(&file);
        fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(file)
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<()> {
        let dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn read_manifest(&self, run_id: &str) -> Result<RunManifest> {
        let path = self.run_dir(run_id).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ArenaError::RunNotFound(run_id.to_string()).into());
        }
        let json = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid manifest {:?}", path))
    }

    /// Run ids with a manifest, oldest first.
    pub fn list_runs(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.root).with_context(|| format!("Failed to list {:?}", self.root))? {
            let entry = entry?;
            if entry.path().join(MANIFEST_FILE).is_file() {
                runs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        runs.sort();
        Ok(runs)
    }

    /// Successful responses of a run, read back from disk.
    pub fn load_variants(&self, run_id: &str) -> Result<Vec<RawVariant>> {
        let manifest = self.read_manifest(run_id)?;
        let dir = self.run_dir(run_id);
        let mut variants = Vec::new();
        for entry in &manifest.entries {
            let Some(file) = &entry.file else {
                continue;
            };
            let path = dir.join(file);
            let raw_text =
                fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
            variants.push(RawVariant {
                id: variant_id(&manifest.run_id, &entry.slug),
                run_id: manifest.run_id.clone(),
                model: entry.model.clone(),
                raw_text,
            });
        }
        Ok(variants)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manifest(run_id: &str) -> RunManifest {
        RunManifest {
            run_id: run_id.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            prompt: "landing page".to_string(),
            entries: vec![
                ManifestEntry {
                    model: "openai/gpt-4o".to_string(),
                    slug: "openai-gpt-4o".to_string(),
                    file: Some("openai-gpt-4o.txt".to_string()),
                    latency_ms: Some(1200),
                    error: None,
                },
                ManifestEntry {
                    model: "x/broken".to_string(),
                    slug: "x-broken".to_string(),
                    file: None,
                    latency_ms: None,
                    error: Some("HTTP 500: oops".to_string()),
                },
            ],
        }
    }

    #[test]
    fn slugs() {
        assert_eq!(model_slug("openai/gpt-4o"), "openai-gpt-4o");
        assert_eq!(model_slug("Meta-Llama/Llama 3.3 (70B)"), "meta-llama-llama-3-3-70b");
        assert_eq!(model_slug("--x--"), "x");
    }

    #[test]
    fn run_id_format() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(new_run_id(t), "run-20250102-030405");
    }

    #[test]
    fn frame_document_strips_one_fence() {
        assert_eq!(frame_document("```html\n<h1>x</h1>\n```\n"), "<h1>x</h1>");
        assert_eq!(frame_document("```\n<p>a</p>\n```"), "<p>a</p>");
        assert_eq!(frame_document("<p>no fence</p>"), "<p>no fence</p>");
    }

    #[test]
    fn frame_document_keeps_prose_around_fence() {
        let raw = "Here you go:\n```html\n<p>a</p>\n```";
        assert_eq!(frame_document(raw), raw);
    }

    #[test]
    fn store_round_trip_skips_failed_models() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RunStore::new(tmp.path());
        store
            .write_response("run-1", "openai-gpt-4o", "<main>hi</main>")
            .unwrap();
        store.write_manifest(&manifest("run-1")).unwrap();

        assert_eq!(store.read_manifest("run-1").unwrap(), manifest("run-1"));
        let variants = store.load_variants("run-1").unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].id, "run-1/openai-gpt-4o");
        assert_eq!(variants[0].raw_text, "<main>hi</main>");
    }

    #[test]
    fn list_runs_only_counts_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RunStore::new(tmp.path());
        store.write_manifest(&manifest("run-b")).unwrap();
        store.write_manifest(&manifest("run-a")).unwrap();
        fs::create_dir_all(tmp.path().join("scratch")).unwrap();
        assert_eq!(store.list_runs().unwrap(), vec!["run-a", "run-b"]);
    }

    #[test]
    fn missing_run_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RunStore::new(tmp.path()).read_manifest("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn index_variant_runs_extractor() {
        let row = index_variant(&RawVariant {
            id: "r/m".to_string(),
            run_id: "r".to_string(),
            model: "m".to_string(),
            raw_text: "```html\n<main onclick=\"x()\">Hi</main>\n```".to_string(),
        });
        assert_eq!(row.raw_section, "<main onclick=\"x()\">Hi</main>");
        assert_eq!(row.sanitized_html, "<main>Hi</main>");
    }
}
