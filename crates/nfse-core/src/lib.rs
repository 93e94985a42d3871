//! Core library for Brazilian NFSe (Nota Fiscal de Serviço Eletrônica) extraction.
//!
//! This crate provides:
//! - PDF processing (text layer and embedded page images)
//! - OCR of scanned documents and photos
//! - Rule-based and AI-assisted NFSe field parsing
//! - JSON persistence of the extracted records

pub mod ai;
pub mod error;
pub mod extractor;
pub mod models;
pub mod ocr;
pub mod output;
pub mod parser;
pub mod pdf;

pub use error::{NfseError, Result};
pub use extractor::{ExtractionOptions, FileType, NfExtractor, SUPPORTED_EXTENSIONS};
pub use models::config::NfseConfig;
pub use models::nfse::{Company, ExtractionMode, Nfse, ParseMode, SourceType, Values};
pub use ocr::{OcrEngine, OcrResult, TextBox};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use parser::{AiNfseParser, ExtractionResult, NfseParser, RuleBasedParser};
pub use pdf::{PdfExtractor, PdfProcessor, PdfType};
