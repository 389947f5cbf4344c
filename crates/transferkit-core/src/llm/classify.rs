//! Provider error taxonomy and retry classification

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

lazy_static! {
    static ref RATE_LIMIT_RE: Regex = Regex::new(
        r"(?i)rate[\s_-]?limit|too many requests|quota|resource[\s_-]?exhausted|throttl"
    )
    .unwrap();
}

/// Errors raised by provider adapters and the orchestrator
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("All providers exhausted: {}", format_failures(.0))]
    AllProvidersExhausted(Vec<AdapterFailure>),
}

impl ProviderError {
    /// Map an HTTP error status and body
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 {
            ProviderError::RateLimited(body)
        } else {
            ProviderError::Http { status, body }
        }
    }

    /// Map a transport-level reqwest failure
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Last error recorded for one adapter during a fallback run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterFailure {
    pub provider: String,
    pub attempts: u32,
    pub error: String,
}

impl fmt::Display for AdapterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} attempt(s)): {}",
            self.provider, self.attempts, self.error
        )
    }
}

fn format_failures(failures: &[AdapterFailure]) -> String {
    if failures.is_empty() {
        return "no adapters configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the orchestrator does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure with budget left: back off and try the same adapter
    Retry,
    /// Rate limit or quota exhaustion: stop using this adapter now
    AbortAdapter,
    /// Budget spent or failure not worth retrying: move to the next adapter
    AdapterExhausted,
}

/// Classify a failed attempt. `attempt` is 1-based.
pub fn classify(error: &ProviderError, attempt: u32, max_retries: u32) -> RetryDecision {
    if is_rate_limit(error) {
        return RetryDecision::AbortAdapter;
    }
    if !is_transient(error) || attempt >= max_retries {
        return RetryDecision::AdapterExhausted;
    }
    RetryDecision::Retry
}

/// Whether the error signals rate limiting or quota exhaustion
pub fn is_rate_limit(error: &ProviderError) -> bool {
    match error {
        ProviderError::RateLimited(_) => true,
        ProviderError::Http { status, body } => *status == 429 || RATE_LIMIT_RE.is_match(body),
        ProviderError::Transport(msg) | ProviderError::InvalidResponse(msg) => {
            RATE_LIMIT_RE.is_match(msg)
        }
        _ => false,
    }
}

fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::Timeout(_)
        | ProviderError::Transport(_)
        | ProviderError::InvalidResponse(_) => true,
        ProviderError::Http { status, .. } => *status >= 500 || *status == 408,
        ProviderError::Unavailable(_)
        | ProviderError::RateLimited(_)
        | ProviderError::Unsupported(_)
        | ProviderError::AllProvidersExhausted(_) => false,
    }
}
