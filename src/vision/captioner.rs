//! Frame captioning collaborators
//!
//! The pipeline never talks to a vision model directly; it hands encoded
//! frame bytes to a [`Captioner`] and stores whatever description comes
//! back. The HTTP implementation uses Claude's vision capabilities.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::pipeline::FrameSource;
use crate::{Error, Result};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// How much captioning effort a frame warrants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Fast, one-line description for routine context updates
    Quick,
    /// Fuller description for frames the client flags as important
    Detailed,
}

impl DetailLevel {
    /// Prompt sent to the vision model for this level
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Quick => "Describe this frame in one short sentence.",
            Self::Detailed => {
                "Describe this frame in 2-3 sentences. \
                 Focus on the main subject and any text visible."
            }
        }
    }

    /// Response token ceiling for this level
    #[must_use]
    pub const fn max_tokens(self) -> u32 {
        match self {
            Self::Quick => 100,
            Self::Detailed => 300,
        }
    }
}

/// External captioning collaborator
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe an encoded JPEG frame
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    async fn describe(
        &self,
        jpeg: &[u8],
        source: FrameSource,
        detail: DetailLevel,
    ) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Vision captioner backed by the Anthropic Messages API
pub struct VisionCaptioner {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

/// A message in the request
#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

/// Content block (text or image)
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image")]
    Image { source: ImageSource<'a> },
}

/// Image source
#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: String,
}

/// Anthropic message response
#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ResponseContent>,
}

/// Response content block
#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

impl VisionCaptioner {
    /// Create a new vision captioner
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Anthropic API key required for captioning".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Create with a specific model
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl Captioner for VisionCaptioner {
    async fn describe(
        &self,
        jpeg: &[u8],
        source: FrameSource,
        detail: DetailLevel,
    ) -> Result<String> {
        let base64_data = base64::engine::general_purpose::STANDARD.encode(jpeg);

        let request = MessageRequest {
            model: &self.model,
            max_tokens: detail.max_tokens(),
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: "image/jpeg",
                            data: base64_data,
                        },
                    },
                    ContentBlock::Text {
                        text: detail.prompt(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Caption(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Caption(format!("API error {status}: {body}")));
        }

        let result: MessageResponse = response
            .json()
            .await
            .map_err(|e| Error::Caption(format!("parse error: {e}")))?;

        let description = result
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(" ");

        if description.is_empty() {
            return Err(Error::Caption("empty response from vision API".to_string()));
        }

        tracing::debug!(source = %source, description = %description, "frame described");
        Ok(description)
    }

    fn name(&self) -> &'static str {
        "anthropic-vision"
    }
}

/// Captioner for development and offline operation.
///
/// Produces a minimal description from frame metadata alone; no network
/// calls are made.
#[derive(Debug, Default)]
pub struct OfflineCaptioner;

#[async_trait]
impl Captioner for OfflineCaptioner {
    async fn describe(
        &self,
        _jpeg: &[u8],
        source: FrameSource,
        detail: DetailLevel,
    ) -> Result<String> {
        let scope = match detail {
            DetailLevel::Quick => "snapshot",
            DetailLevel::Detailed => "scene",
        };
        Ok(format!("Uncaptioned {source} {scope} (offline mode)"))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(VisionCaptioner::new(String::new()).is_err());
    }

    #[test]
    fn detail_levels_differ() {
        assert_ne!(DetailLevel::Quick.prompt(), DetailLevel::Detailed.prompt());
        assert!(DetailLevel::Quick.max_tokens() < DetailLevel::Detailed.max_tokens());
    }

    #[tokio::test]
    async fn offline_captioner_mentions_source() {
        let captioner = OfflineCaptioner;
        let text = captioner
            .describe(&[], FrameSource::Screen, DetailLevel::Quick)
            .await
            .unwrap();
        assert!(text.contains("screen"));
    }
}
