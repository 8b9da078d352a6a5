//! Text generation against the external provider
//!
//! [`GenerativeBackend`] is one raw provider call. [`ResilientClient`]
//! wraps a backend with the retry policy and turns raw failures into
//! [`GenerationError`]s.

mod gemini;
mod mock;
mod resilient;
mod response;

pub use gemini::GeminiBackend;
pub use mock::ScriptedBackend;
pub use resilient::{GenerationError, ResilientClient, RetryPolicy};
pub use response::{
    Candidate, Content, GroundingAttribution, GroundingMetadata, Part, ProviderResponse, WebSource,
};

use async_trait::async_trait;
use serde::Serialize;

/// Image sent inline with the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    pub system_instruction: String,
    pub image: Option<InlineImage>,
    pub prompt: Option<String>,
}

impl GenerateRequest {
    /// Prompt text, if it has any non-blank content
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// No text and no image: nothing to ask
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.prompt_text().is_none()
    }
}

/// Web citation attached to an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Answered {
        text: String,
        sources: Vec<GroundingSource>,
    },
    /// The provider succeeded but returned no text
    NoAnswer,
}

/// Raw failure of a single provider call
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// DNS, connect, timeout, reset
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success status with the body as returned
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Success status but a body that is not a provider response
    #[error("Malformed response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Model identifier, for logs
    fn id(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, BackendError>;
}
