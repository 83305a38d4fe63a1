use thiserror::Error;

/// Failure talking to a model provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured (set ARENA_API_KEY)")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion payload: {0}")]
    Payload(String),
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

impl ProviderError {
    /// Rate limits, server errors and dropped connections are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("no pair with id {0}")]
    UnknownPair(i64),
    #[error("no manifest for run {0:?}")]
    RunNotFound(String),
    #[error("invalid vote {0:?} (expected left, right or tie)")]
    InvalidChoice(String),
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let status = |status| ProviderError::Status {
            status,
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(502).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!ProviderError::EmptyCompletion.is_retryable());
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            ArenaError::InvalidChoice("both".into()).to_string(),
            "invalid vote \"both\" (expected left, right or tie)"
        );
        assert_eq!(ArenaError::UnknownPair(7).to_string(), "no pair with id 7");
    }
}
