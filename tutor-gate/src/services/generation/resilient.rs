//! Retrying generation client
//!
//! Up to `max_attempts` calls per generation. Between attempts the client
//! waits `backoff_base * 2^attempt` (attempt counted from 0), so the
//! default policy waits 1s then 2s. Network failures and provider error
//! statuses are retried alike, except a 400 whose body reports
//! `INVALID_ARGUMENT`: the request itself is wrong and is returned at once.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{BackendError, GenerateRequest, GenerationOutcome, GenerativeBackend};

/// Terminal generation failure
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error after {attempts} attempts: {cause}")]
    NetworkExhausted { attempts: u32, cause: String },

    #[error("Provider error {status} after {attempts} attempts: {body}")]
    ProviderRejected {
        status: u16,
        body: String,
        attempts: u32,
    },

    #[error("Provider rejected the request as invalid ({status}): {body}")]
    BadRequest { status: u16, body: String },

    #[error("Unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

impl GenerationError {
    /// Stable machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Configuration(_) => "configuration",
            GenerationError::NetworkExhausted { .. } => "network_exhausted",
            GenerationError::ProviderRejected { .. } => "provider_rejected",
            GenerationError::BadRequest { .. } => "bad_request",
            GenerationError::UnexpectedResponse(_) => "unexpected_response",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// True for a 400 whose JSON body has `error.status == "INVALID_ARGUMENT"`
fn is_invalid_argument(status: u16, body: &str) -> bool {
    status == 400
        && serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/status")
                    .and_then(|s| s.as_str())
                    .map(|s| s == "INVALID_ARGUMENT")
            })
            .unwrap_or(false)
}

pub struct ResilientClient {
    backend: Arc<dyn GenerativeBackend>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerationOutcome, GenerationError> {
        if request.is_empty() {
            return Err(GenerationError::Configuration(
                "Nothing to send: no prompt text and no image".to_string(),
            ));
        }

        let max_attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let error = match self.backend.generate(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(backend = self.backend.id(), attempt, "Generation succeeded after retry");
                    }
                    return Ok(response.into_outcome());
                }
                Err(BackendError::Decode(cause)) => {
                    tracing::error!(backend = self.backend.id(), %cause, "Provider returned an unreadable body");
                    return Err(GenerationError::UnexpectedResponse(cause));
                }
                Err(BackendError::Http { status, body }) if is_invalid_argument(status, &body) => {
                    tracing::error!(backend = self.backend.id(), status, %body, "Provider rejected request as invalid");
                    return Err(GenerationError::BadRequest { status, body });
                }
                Err(BackendError::Http { status, body }) => GenerationError::ProviderRejected {
                    status,
                    body,
                    attempts: attempt + 1,
                },
                Err(BackendError::Network(cause)) => GenerationError::NetworkExhausted {
                    attempts: attempt + 1,
                    cause,
                },
            };

            if attempt + 1 < max_attempts {
                let backoff = self.policy.backoff_for(attempt);
                tracing::warn!(
                    backend = self.backend.id(),
                    attempt = attempt + 1,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Generation attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            last_error = Some(error);
        }

        let error = last_error.unwrap_or_else(|| {
            GenerationError::Configuration("Retry policy made no attempts".to_string())
        });
        tracing::error!(backend = self.backend.id(), kind = error.kind(), error = %error, "Generation failed");
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_invalid_argument_detection() {
        let body = r#"{"error":{"code":400,"message":"bad field","status":"INVALID_ARGUMENT"}}"#;
        assert!(is_invalid_argument(400, body));
        assert!(!is_invalid_argument(500, body));
        assert!(!is_invalid_argument(400, r#"{"error":{"status":"FAILED_PRECONDITION"}}"#));
        assert!(!is_invalid_argument(400, "not json"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GenerationError::NetworkExhausted {
                attempts: 3,
                cause: "reset".into()
            }
            .kind(),
            "network_exhausted"
        );
        assert_eq!(GenerationError::UnexpectedResponse("x".into()).kind(), "unexpected_response");
    }
}
