use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::ProviderError;
use crate::runs::{model_slug, ManifestEntry, RunManifest, RunStore};

const BASE_BACKOFF_MS: u64 = 2000;
const MAX_BACKOFF_MS: u64 = 5 * 60 * 1000;

/// Generation stats returned after completion.
pub struct GenerateStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completions endpoint.
pub struct Provider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
}

impl Provider {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Provider {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            max_retries: settings.max_retries,
        })
    }

    pub async fn complete_with_retry(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.complete(model, prompt).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = backoff_delay(attempt);
                    warn!(
                        "{} failed on {} (attempt {}/{}), backing off {:.1}s",
                        e,
                        model,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_completion(&body)
    }
}

/// Exponential backoff from `BASE_BACKOFF_MS`, capped at `MAX_BACKOFF_MS`.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| BASE_BACKOFF_MS.checked_mul(factor))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS));
    Duration::from_millis(ms)
}

/// Pull the first choice's text out of a chat completions body.
pub fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Payload(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ProviderError::EmptyCompletion)
}

struct Outcome {
    model: String,
    result: Result<String, ProviderError>,
    latency_ms: u64,
}

/// Ask every model concurrently, saving each response to the run directory as
/// it arrives. Failed models are recorded in the manifest, not fatal.
pub async fn run_generation(
    settings: &Settings,
    store: &RunStore,
    run_id: &str,
    models: Vec<String>,
) -> Result<GenerateStats> {
    let provider = Arc::new(Provider::from_settings(settings)?);
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let prompt: Arc<str> = Arc::from(settings.prompt.as_str());
    let total = models.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Outcome>(total.max(1));

    for model in models {
        let provider = Arc::clone(&provider);
        let sem = Arc::clone(&semaphore);
        let prompt = Arc::clone(&prompt);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let start = Instant::now();
            let result = provider.complete_with_retry(&model, &prompt).await;
            let latency_ms = start.elapsed().as_millis() as u64;
            let _ = tx.send(Outcome { model, result, latency_ms }).await;
        });
    }

    // rx closes once every task has dropped its sender
    drop(tx);

    let mut entries = Vec::with_capacity(total);
    let mut ok = 0usize;
    let mut errors = 0usize;

    while let Some(outcome) = rx.recv().await {
        let slug = model_slug(&outcome.model);
        let entry = match outcome.result {
            Ok(text) => {
                let file = store.write_response(run_id, &slug, &text)?;
                ok += 1;
                ManifestEntry {
                    model: outcome.model,
                    slug,
                    file: Some(file),
                    latency_ms: Some(outcome.latency_ms),
                    error: None,
                }
            }
            Err(e) => {
                warn!("{} failed: {}", outcome.model, e);
                errors += 1;
                ManifestEntry {
                    model: outcome.model,
                    slug,
                    file: None,
                    latency_ms: Some(outcome.latency_ms),
                    error: Some(e.to_string()),
                }
            }
        };
        pb.set_message(entry.model.clone());
        pb.inc(1);
        entries.push(entry);
    }
    pb.finish_and_clear();

    entries.sort_by(|a, b| a.slug.cmp(&b.slug));
    store.write_manifest(&RunManifest {
        run_id: run_id.to_string(),
        created_at: Utc::now(),
        prompt: settings.prompt.clone(),
        entries,
    })?;

    info!("Generated {} responses ({} ok, {} errors)", total, ok, errors);
    Ok(GenerateStats { total, ok, errors })
}

// ── Tests ──
