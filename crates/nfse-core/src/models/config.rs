//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NfseError, Result};

/// Environment variable holding the AI API key.
pub const ENV_API_KEY: &str = "CLAUDE_API_KEY";
/// Environment variable overriding the AI model identifier.
pub const ENV_MODEL_ID: &str = "CLAUDE_API_ID";
/// Environment variable overriding the AI model alias.
pub const ENV_MODEL_ALIAS: &str = "CLAUDE_API_ALIAS";
/// Environment variable overriding the OCR model directory.
pub const ENV_OCR_MODEL_DIR: &str = "NFSE_OCR_MODEL_DIR";

/// Main configuration for the nf-extract pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NfseConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// AI service configuration.
    pub ai: AiConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Output file configuration.
    pub output: OutputConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Images narrower than this are upscaled before recognition.
    pub upscale_min_width: u32,

    /// Width that small images are upscaled to.
    pub upscale_target_width: u32,

    /// Apply adaptive thresholding before recognition.
    pub binarize: bool,

    /// Neighbourhood size for adaptive thresholding (odd, in pixels).
    pub threshold_block_size: u32,

    /// Constant subtracted from the local mean when thresholding.
    pub threshold_offset: i32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            upscale_min_width: 1000,
            upscale_target_width: 1500,
            binarize: true,
            threshold_block_size: 11,
            threshold_offset: 2,
        }
    }
}

impl OcrConfig {
    /// Get full path to a model file.
    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.model_dir.join(file_name)
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum text length to consider a PDF text-based.
    pub min_text_length: usize,

    /// OCR embedded page images when the text layer is too short.
    pub ocr_fallback: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            ocr_fallback: true,
        }
    }
}

/// AI service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of the Messages API.
    pub api_base: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Friendly alias of the model, recorded in metadata.
    pub model_alias: String,

    /// Maximum tokens in the model's answer.
    pub max_tokens: u32,

    /// Value of the `anthropic-version` header.
    pub api_version: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// API key. Never written to config files; comes from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            model_alias: "claude-sonnet-4-5".to_string(),
            max_tokens: 4000,
            api_version: "2023-06-01".to_string(),
            timeout_secs: 120,
            api_key: None,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Check CNPJ/CPF check digits and report invalid ones as warnings.
    pub validate_documents: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            validate_documents: true,
        }
    }
}

/// Output file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix of saved JSON file names.
    pub file_prefix: String,

    /// Pretty-print saved JSON.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_prefix: "nfse_".to_string(),
            pretty: true,
        }
    }
}

impl NfseConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| NfseError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration from an optional file, then apply `.env` and
    /// process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.ai.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_MODEL_ID) {
            self.ai.model = model;
        }
        if let Some(alias) = non_empty(ENV_MODEL_ALIAS) {
            self.ai.model_alias = alias;
        }
        if let Some(dir) = non_empty(ENV_OCR_MODEL_DIR) {
            self.ocr.model_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pdf": {"min_text_length": 10}}"#).unwrap();

        let config = NfseConfig::from_file(&path).unwrap();
        assert_eq!(config.pdf.min_text_length, 10);
        assert!(config.pdf.ocr_fallback);
        assert_eq!(config.ai.max_tokens, 4000);
        assert_eq!(config.output.file_prefix, "nfse_");
    }

    #[test]
    fn test_api_key_never_serialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NfseConfig::default();
        config.ai.api_key = Some("secret".to_string());
        let content = serde_json::to_string_pretty(&config).unwrap();
        assert!(!content.contains("secret"));

        std::fs::write(&path, content).unwrap();
        let reloaded = NfseConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.ai.api_key, None);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk-test"),
            (ENV_MODEL_ID, "claude-test"),
            (ENV_MODEL_ALIAS, "  "),
            (ENV_OCR_MODEL_DIR, "/opt/models"),
        ]
        .into_iter()
        .collect();

        let mut config = NfseConfig::default();
        config.apply_env_overrides_with(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.ai.model, "claude-test");
        assert_eq!(config.ai.model_alias, "claude-sonnet-4-5");
        assert_eq!(config.ocr.model_dir, PathBuf::from("/opt/models"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(NfseConfig::from_file(&path), Err(NfseError::Config(_))));
    }
}
