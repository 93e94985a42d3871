//! AI text and vision service.
//!
//! [`LanguageModel`] is the seam between the pipeline and a hosted model.
//! [`AnthropicClient`] implements it over the Messages API; tests and
//! alternative backends provide their own implementations.

mod anthropic;
pub mod prompts;
pub mod response;

pub use anthropic::AnthropicClient;
pub use response::parse_model_json;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::AiError;

/// A piece of user content sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// Base64-encoded image.
    Image { media_type: String, data: String },
}

impl ContentBlock {
    /// Encode raw image bytes as an image block.
    pub fn image(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: STANDARD.encode(bytes),
        }
    }
}

/// A single-turn completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt.
    pub system: String,
    /// User message content.
    pub content: Vec<ContentBlock>,
    /// Maximum tokens in the answer.
    pub max_tokens: u32,
}

/// Hosted language model able to answer a completion request.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send the request and return the model's text answer.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;

    /// Name recorded in extraction metadata.
    fn model_name(&self) -> &str;
}

/// Media type for an image file extension.
pub fn media_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
