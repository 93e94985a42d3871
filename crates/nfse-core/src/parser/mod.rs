//! NFSe text parsing: deterministic rules and AI-assisted.

mod ai;
pub mod documents;
pub mod patterns;
mod rules;
pub mod text;

pub use ai::AiNfseParser;
pub use rules::RuleBasedParser;

use crate::error::ExtractionError;
use crate::models::nfse::Nfse;

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result of parsing NFSe text.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Parsed NFSe.
    pub nfse: Nfse,
    /// Text the NFSe was parsed from.
    pub raw_text: String,
    /// Parsing warnings.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for synchronous NFSe parsers.
pub trait NfseParser {
    /// Parse an NFSe from text.
    fn parse(&self, text: &str) -> Result<ExtractionResult>;
}
