//! Anthropic Messages API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionRequest, ContentBlock, LanguageModel};
use crate::error::AiError;
use crate::models::config::AiConfig;

/// Client for Claude models.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    api_base: String,
    api_version: String,
    model: String,
    model_alias: String,
}

impl AnthropicClient {
    /// Build a client from configuration. Requires an API key.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AiError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            model_alias: config.model_alias.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RequestContent<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl<'a> From<&'a ContentBlock> for RequestContent<'a> {
    fn from(block: &'a ContentBlock) -> Self {
        match block {
            ContentBlock::Text(text) => RequestContent::Text { text },
            ContentBlock::Image { media_type, data } => RequestContent::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type,
                    data,
                },
            },
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let start = Instant::now();
        let url = format!("{}/v1/messages", self.api_base);

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: vec![Message {
                role: "user",
                content: request.content.iter().map(RequestContent::from).collect(),
            }],
        };

        debug!("Sending request to {} ({})", self.model_alias, url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        debug!(
            "Model answered {} characters in {} ms",
            text.len(),
            start.elapsed().as_millis()
        );

        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_alias
    }
}
