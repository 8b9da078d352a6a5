//! Provider response shape
//!
//! Every level is optional. Anything missing on the way to the answer text
//! yields [`GenerationOutcome::NoAnswer`].

use serde::{Deserialize, Serialize};

use super::{GenerationOutcome, GroundingSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

/// Citations. Older models report `groundingAttributions`, newer ones
/// `groundingChunks`; both carry a `web` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_attributions: Vec<GroundingAttribution>,
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingAttribution>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingAttribution {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ProviderResponse {
    /// Single candidate with a single text part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
                grounding_metadata: None,
            }],
        }
    }

    /// Add a web citation to the first candidate
    pub fn with_source(mut self, uri: impl Into<String>, title: impl Into<String>) -> Self {
        if let Some(candidate) = self.candidates.first_mut() {
            candidate
                .grounding_metadata
                .get_or_insert_with(GroundingMetadata::default)
                .grounding_attributions
                .push(GroundingAttribution {
                    web: Some(WebSource {
                        uri: Some(uri.into()),
                        title: Some(title.into()),
                    }),
                });
        }
        self
    }

    pub fn into_outcome(self) -> GenerationOutcome {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return GenerationOutcome::NoAnswer;
        };

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty());

        match text {
            Some(text) => GenerationOutcome::Answered {
                text,
                sources: candidate
                    .grounding_metadata
                    .map(GroundingMetadata::into_sources)
                    .unwrap_or_default(),
            },
            None => GenerationOutcome::NoAnswer,
        }
    }
}

impl GroundingMetadata {
    /// Entries with a URI and a non-blank title, first occurrence per URI
    fn into_sources(self) -> Vec<GroundingSource> {
        let mut sources: Vec<GroundingSource> = Vec::new();
        for web in self
            .grounding_attributions
            .into_iter()
            .chain(self.grounding_chunks)
            .filter_map(|a| a.web)
        {
            let (Some(uri), Some(title)) = (web.uri, web.title) else {
                continue;
            };
            if uri.trim().is_empty() || title.trim().is_empty() {
                continue;
            }
            if sources.iter().any(|s| s.uri == uri) {
                continue;
            }
            sources.push(GroundingSource { uri, title });
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerationOutcome {
        serde_json::from_str::<ProviderResponse>(json).unwrap().into_outcome()
    }

    #[test]
    fn test_first_text_part_is_the_answer() {
        let outcome = parse(r#"{"candidates":[{"content":{"parts":[{"text":"x = 2"},{"text":"ignored"}]}}]}"#);
        assert_eq!(
            outcome,
            GenerationOutcome::Answered {
                text: "x = 2".into(),
                sources: vec![]
            }
        );
    }

    #[test]
    fn test_missing_levels_are_no_answer() {
        assert_eq!(parse("{}"), GenerationOutcome::NoAnswer);
        assert_eq!(parse(r#"{"candidates":[]}"#), GenerationOutcome::NoAnswer);
        assert_eq!(parse(r#"{"candidates":[{}]}"#), GenerationOutcome::NoAnswer);
        assert_eq!(parse(r#"{"candidates":[{"content":{"parts":[]}}]}"#), GenerationOutcome::NoAnswer);
        assert_eq!(parse(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#), GenerationOutcome::NoAnswer);
    }

    #[test]
    fn test_sources_need_uri_and_title() {
        let outcome = parse(
            r#"{"candidates":[{
                "content":{"parts":[{"text":"ok"}]},
                "groundingMetadata":{"groundingAttributions":[
                    {"web":{"uri":"https://a.ma","title":"A"}},
                    {"web":{"uri":"https://b.ma","title":""}},
                    {"web":{"title":"no uri"}},
                    {},
                    {"web":{"uri":"https://a.ma","title":"A again"}}
                ]}
            }]}"#,
        );
        let GenerationOutcome::Answered { sources, .. } = outcome else {
            panic!("expected an answer");
        };
        assert_eq!(
            sources,
            vec![GroundingSource {
                uri: "https://a.ma".into(),
                title: "A".into()
            }]
        );
    }

    #[test]
    fn test_grounding_chunks_are_read() {
        let outcome = parse(
            r#"{"candidates":[{
                "content":{"parts":[{"text":"ok"}]},
                "groundingMetadata":{"groundingChunks":[{"web":{"uri":"https://c.ma","title":"C"}}]}
            }]}"#,
        );
        let GenerationOutcome::Answered { sources, .. } = outcome else {
            panic!("expected an answer");
        };
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_with_source_helper() {
        let outcome = ProviderResponse::text("hi").with_source("https://d.ma", "D").into_outcome();
        let GenerationOutcome::Answered { sources, .. } = outcome else {
            panic!("expected an answer");
        };
        assert_eq!(sources[0].title, "D");
    }
}
