use std::path::PathBuf;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

pub const DEFAULT_PROMPT: &str = "\
Create a complete, standalone HTML landing page for a fictional SaaS product \
called \"Acme Pages\" that turns a one-line product description into a \
landing page. Include a hero section with id=\"hero\" (headline, subheadline, \
primary call to action, product screenshot placeholder), a features grid, \
pricing with three tiers, testimonials and a footer. Use modern, responsive \
styling. Return only the HTML document.";

const DEFAULT_MODELS: &[&str] = &[
    "openai/gpt-4o",
    "google/gemini-2.0-flash-001",
    "meta-llama/llama-3.3-70b-instruct",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub runs_dir: PathBuf,
    pub preview_path: PathBuf,
    pub api_base: String,
    pub api_key: Option<String>,
    pub models: Vec<String>,
    pub concurrency: usize,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub prompt: String,
}

impl Settings {
    /// Defaults, then `arena.{toml,yaml,json}` if present, then `ARENA_*` env vars.
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("arena").required(false))
            .add_source(
                Environment::with_prefix("ARENA")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("models"),
            );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let models: Vec<String> = DEFAULT_MODELS.iter().map(|m| m.to_string()).collect();
        let settings = builder
            .set_default("db_path", "data/arena.sqlite")?
            .set_default("runs_dir", "runs")?
            .set_default("preview_path", "data/compare.html")?
            .set_default("api_base", "https://openrouter.ai/api/v1")?
            .set_default("models", models)?
            .set_default("concurrency", 4)?
            .set_default("max_retries", 3)?
            .set_default("request_timeout_secs", 300)?
            .set_default("prompt", DEFAULT_PROMPT)?
            .build()
            .context("Failed to build settings")?;
        settings
            .try_deserialize()
            .context("Invalid settings")
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let s = Settings::from_builder(Config::builder()).unwrap();
        assert_eq!(s.db_path, PathBuf::from("data/arena.sqlite"));
        assert_eq!(s.runs_dir, PathBuf::from("runs"));
        assert_eq!(s.concurrency, 4);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.models.len(), DEFAULT_MODELS.len());
        assert!(s.api_key.is_none());
        assert!(s.prompt.contains("id=\"hero\""));
    }

    #[test]
    fn overrides_win_over_defaults() {
        let builder = Config::builder()
            .set_override("concurrency", 8)
            .unwrap()
            .set_override("api_key", "sk-test")
            .unwrap()
            .set_override("models", vec!["a/one", "b/two"])
            .unwrap();
        let s = Settings::from_builder(builder).unwrap();
        assert_eq!(s.concurrency, 8);
        assert_eq!(s.api_key.as_deref(), Some("sk-test"));
        assert_eq!(s.models, vec!["a/one".to_string(), "b/two".to_string()]);
    }
}
