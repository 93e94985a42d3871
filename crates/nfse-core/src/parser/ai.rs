//! AI-assisted NFSe parser.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::ai::{parse_model_json, prompts, CompletionRequest, ContentBlock, LanguageModel};
use crate::error::{ExtractionError, Result};

use super::ExtractionResult;
use super::text::clean_text;

/// Parser that hands the text to a language model and reads back JSON.
pub struct AiNfseParser {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl AiNfseParser {
    /// Create a parser using the given model.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_tokens: 4000,
        }
    }

    /// Set the answer token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Parse NFSe text through the model.
    pub async fn parse(&self, text: &str) -> Result<ExtractionResult> {
        let start = Instant::now();
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return Err(ExtractionError::NoData.into());
        }

        info!(
            "Sending {} characters of NFS-e text to {}",
            cleaned.len(),
            self.model.model_name()
        );

        let request = CompletionRequest {
            system: prompts::STRUCTURED_DATA_SYSTEM.to_string(),
            content: vec![ContentBlock::Text(prompts::text_message(text))],
            max_tokens: self.max_tokens,
        };

        let answer = self.model.complete(&request).await?;
        let mut nfse = parse_model_json(&answer)?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        nfse.metadata.ai_model = Some(self.model.model_name().to_string());
        nfse.metadata.processing_time_ms = Some(processing_time_ms);

        let warnings = nfse.validate();
        nfse.metadata.warnings = warnings.clone();

        Ok(ExtractionResult {
            nfse,
            raw_text: text.to_string(),
            warnings,
            processing_time_ms,
        })
    }
}
