//! Gemini `generateContent` backend

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use std::time::Duration;
use tutor_common::config::is_valid_key;

use super::{BackendError, GenerateRequest, GenerationError, GenerativeBackend, ProviderResponse};

const USER_AGENT: &str = concat!("tutor-gate/", env!("CARGO_PKG_VERSION"));

/// Request body as the provider expects it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireContent<'a>>,
    tools: Vec<WireTool>,
    system_instruction: WireContent<'a>,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Image {
        #[serde(rename = "inlineData")]
        inline_data: WireBlob<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob<'a> {
    mime_type: &'a str,
    data: String,
}

/// Enables web-grounded search
#[derive(Debug, Serialize)]
struct WireTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        // Image first, then the question about it
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            parts.push(WirePart::Image {
                inline_data: WireBlob {
                    mime_type: &image.mime_type,
                    data: BASE64.encode(&image.data),
                },
            });
        }
        if let Some(text) = request.prompt_text() {
            parts.push(WirePart::Text { text });
        }

        Self {
            contents: vec![WireContent { parts }],
            tools: vec![WireTool {
                google_search: GoogleSearch {},
            }],
            system_instruction: WireContent {
                parts: vec![WirePart::Text {
                    text: &request.system_instruction,
                }],
            },
        }
    }
}

/// Gemini REST client
pub struct GeminiBackend {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    /// Build a client for `api_url`; the key is checked here so a bad
    /// deployment fails at startup, not on the first question.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let api_url = api_url.into();
        let api_key = api_key.into();

        if !is_valid_key(&api_key) {
            return Err(GenerationError::Configuration(
                "Gemini API key is missing or still the placeholder".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Configuration(format!("HTTP client: {}", e)))?;

        let model = model_from_url(&api_url);

        Ok(Self {
            http_client,
            api_url,
            api_key: api_key.trim().to_string(),
            model,
        })
    }
}

/// `.../models/<model>:generateContent` → `<model>`
fn model_from_url(api_url: &str) -> String {
    api_url
        .rsplit('/')
        .next()
        .and_then(|last| last.split(':').next())
        .filter(|m| !m.is_empty())
        .unwrap_or("gemini")
        .to_string()
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, BackendError> {
        let body = WireRequest::from_request(request);

        tracing::debug!(
            model = %self.model,
            has_image = request.image.is_some(),
            has_text = request.prompt_text().is_some(),
            "Calling Gemini"
        );

        let response = self
            .http_client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.without_url().to_string()))?;

        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generation::InlineImage;

    #[test]
    fn test_model_from_url() {
        assert_eq!(
            model_from_url("https://x.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"),
            "gemini-2.5-flash"
        );
        assert_eq!(model_from_url(""), "gemini");
    }

    #[test]
    fn test_placeholder_key_rejected() {
        let result = GeminiBackend::new("http://localhost", "PLACEHOLDER_FOR_API_KEY", Duration::from_secs(1));
        assert!(matches!(result, Err(GenerationError::Configuration(_))));
    }

    #[test]
    fn test_wire_body_layout() {
        let request = GenerateRequest {
            system_instruction: "be kind".into(),
            image: Some(InlineImage {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
            }),
            prompt: Some("solve".into()),
        };
        let json = serde_json::to_value(WireRequest::from_request(&request)).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "AQID");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "solve");
        assert_eq!(json["tools"][0]["google_search"], serde_json::json!({}));
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be kind");
    }

    #[test]
    fn test_blank_prompt_not_sent() {
        let request = GenerateRequest {
            system_instruction: "s".into(),
            image: Some(InlineImage {
                mime_type: "image/jpeg".into(),
                data: vec![0],
            }),
            prompt: Some("   ".into()),
        };
        let json = serde_json::to_value(WireRequest::from_request(&request)).unwrap();
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }
}
