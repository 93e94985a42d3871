//! Error types for the nfse-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the nfse library.
#[derive(Error, Debug)]
pub enum NfseError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// NFSe field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from the AI text/vision service.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input file type is not handled.
    #[error("unsupported file type: {} (supported extensions: {supported})", .path.display())]
    UnsupportedFile { path: PathBuf, supported: String },

    /// The requested extraction mode does not apply to this input.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Requested page does not exist.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// No document has been loaded yet.
    #[error("no document loaded")]
    NotLoaded,
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Model files are missing from the configured directory.
    #[error("OCR models not found in {}; set ocr.model_dir or NFSE_OCR_MODEL_DIR", .0.display())]
    ModelsNotFound(PathBuf),

    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The crate was built without an OCR backend.
    #[error("no OCR backend compiled in (enable the `native` feature)")]
    Unavailable,
}

/// Errors related to NFSe field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Failed to parse a value.
    #[error("failed to parse {field}: {value}")]
    Parse { field: String, value: String },

    /// No NFSe data could be extracted.
    #[error("no NFSe data found")]
    NoData,
}

/// Errors from the AI service and its responses.
#[derive(Error, Debug)]
pub enum AiError {
    /// No API key in the environment or config.
    #[error("AI API key is not configured; set CLAUDE_API_KEY in the environment or a .env file")]
    MissingApiKey,

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status returned by the API.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The API answered without any text content.
    #[error("empty response from model")]
    EmptyResponse,

    /// The model's answer was not the expected JSON.
    #[error("invalid JSON from model: {0}")]
    InvalidJson(String),
}

/// Result type for the nfse library.
pub type Result<T> = std::result::Result<T, NfseError>;
