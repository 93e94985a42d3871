//! File-level NFSe extraction: picks the text source and the parser.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::ai::{self, AnthropicClient, CompletionRequest, ContentBlock, LanguageModel, prompts};
use crate::error::{NfseError, OcrError, Result};
use crate::models::config::NfseConfig;
use crate::models::nfse::{ExtractionMode, Nfse, ParseMode, SourceType};
use crate::ocr::{ImagePreprocessor, OcrEngine};
use crate::output;
use crate::parser::{AiNfseParser, NfseParser, RuleBasedParser};
use crate::pdf::{PdfExtractor, PdfProcessor, PdfType};

/// Extensions accepted by [`NfExtractor`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// User-selected extraction modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Let an AI vision model read image files instead of local OCR.
    pub ai_extraction: bool,
    /// Parse extracted text with an AI model instead of rules.
    pub ai_parse: bool,
}

/// Kind of input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Image,
}

impl FileType {
    /// Detect the file type from the path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Text read from a file along with where it came from.
struct RawText {
    text: String,
    source_type: SourceType,
    extraction_mode: ExtractionMode,
    ocr_engine: Option<String>,
}

/// Extracts an [`Nfse`] from a single PDF or image file.
pub struct NfExtractor {
    path: PathBuf,
    file_type: FileType,
    options: ExtractionOptions,
    config: NfseConfig,
    ocr_engine: Option<Box<dyn OcrEngine>>,
    language_model: Option<Arc<dyn LanguageModel>>,
}

impl NfExtractor {
    /// Validate the input and create an extractor for it.
    pub fn new(path: impl AsRef<Path>, options: ExtractionOptions, config: NfseConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.is_file() {
            return Err(NfseError::NotFound(path));
        }

        let file_type = FileType::from_path(&path).ok_or_else(|| NfseError::UnsupportedFile {
            path: path.clone(),
            supported: SUPPORTED_EXTENSIONS.join(", "),
        })?;

        if file_type == FileType::Pdf && options.ai_extraction {
            return Err(NfseError::UnsupportedMode(
                "AI extraction is only available for image files; use --ai-parse for PDFs".to_string(),
            ));
        }

        Ok(Self {
            path,
            file_type,
            options,
            config,
            ocr_engine: None,
            language_model: None,
        })
    }

    /// Use this OCR engine instead of loading models from the configuration.
    pub fn with_ocr_engine(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Use this model instead of the configured AI client.
    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn options(&self) -> ExtractionOptions {
        self.options
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw text of the document, from the PDF text layer or OCR.
    pub fn extract_text(&self) -> Result<String> {
        Ok(self.read_text()?.text)
    }

    /// Extract the NFSe using the selected modes.
    pub async fn extract(&self) -> Result<Nfse> {
        let start = Instant::now();
        info!("Extracting NFS-e from {}", self.path.display());

        let mut nfse = if self.file_type == FileType::Image && self.options.ai_extraction {
            self.extract_with_vision().await?
        } else {
            let raw = self.read_text()?;
            let mut nfse = self.parse_text(&raw.text).await?;
            nfse.metadata.source_type = raw.source_type;
            nfse.metadata.extraction_mode = raw.extraction_mode;
            nfse.metadata.ocr_engine = raw.ocr_engine;
            nfse
        };

        nfse.metadata.processing_time_ms = Some(start.elapsed().as_millis() as u64);
        info!(
            "Extracted NFS-e {} ({:?}/{:?}, confidence {:.2})",
            nfse.header.number.as_deref().unwrap_or("?"),
            nfse.metadata.extraction_mode,
            nfse.metadata.parse_mode,
            nfse.metadata.confidence
        );

        Ok(nfse)
    }

    /// Extract, then save the JSON next to the input or in `output_dir`.
    pub async fn extract_and_save(&self, output_dir: Option<&Path>) -> Result<PathBuf> {
        let nfse = self.extract().await?;
        self.save(&nfse, output_dir)
    }

    /// Save an already extracted NFSe under the configured file naming.
    pub fn save(&self, nfse: &Nfse, output_dir: Option<&Path>) -> Result<PathBuf> {
        let path = output::output_path(
            &self.path,
            nfse.identifier(),
            output_dir,
            &self.config.output.file_prefix,
        )?;
        output::save_json(nfse, &path, self.config.output.pretty)?;
        info!("Saved NFS-e to {}", path.display());
        Ok(path)
    }

    fn read_text(&self) -> Result<RawText> {
        match self.file_type {
            FileType::Pdf => self.read_pdf(),
            FileType::Image => {
                let image = image::open(&self.path)?;
                let (text, engine) = self.ocr_images(&[image])?;
                Ok(RawText {
                    text,
                    source_type: SourceType::Image,
                    extraction_mode: ExtractionMode::Ocr,
                    ocr_engine: Some(engine),
                })
            }
        }
    }

    fn read_pdf(&self) -> Result<RawText> {
        let data = fs::read(&self.path)?;
        let pdf = PdfExtractor::from_bytes(&data)?;
        debug!("PDF has {} pages", pdf.page_count());

        let pdf_type = pdf.analyze(self.config.pdf.min_text_length);
        debug!("PDF type: {:?}", pdf_type);

        if pdf_type == PdfType::Scanned && self.config.pdf.ocr_fallback {
            match self.ocr_pdf(&pdf) {
                Ok(raw) => return Ok(raw),
                Err(e) => warn!("OCR of page images failed, using the text layer: {}", e),
            }
        }

        Ok(RawText {
            text: pdf.extract_text()?,
            source_type: SourceType::TextPdf,
            extraction_mode: ExtractionMode::TextLayer,
            ocr_engine: None,
        })
    }

    fn ocr_pdf(&self, pdf: &PdfExtractor) -> Result<RawText> {
        let images = pdf.extract_all_page_images()?;
        info!("Text layer too short, running OCR on {} page images", images.len());
        let (text, engine) = self.ocr_images(&images)?;
        Ok(RawText {
            text,
            source_type: SourceType::ScannedPdf,
            extraction_mode: ExtractionMode::Ocr,
            ocr_engine: Some(engine),
        })
    }

    /// OCR each image and join the non-empty texts. Returns the text and engine name.
    fn ocr_images(&self, images: &[DynamicImage]) -> Result<(String, String)> {
        match &self.ocr_engine {
            Some(engine) => self.run_ocr(engine.as_ref(), images),
            None => {
                let engine = default_ocr_engine(&self.config)?;
                self.run_ocr(engine.as_ref(), images)
            }
        }
    }

    fn run_ocr(&self, engine: &dyn OcrEngine, images: &[DynamicImage]) -> Result<(String, String)> {
        let preprocessor = ImagePreprocessor::from_config(&self.config.ocr);
        let mut texts = Vec::new();

        for (i, image) in images.iter().enumerate() {
            let prepared = preprocessor.process(image);
            match engine.recognize(&prepared) {
                Ok(result) if !result.text.trim().is_empty() => texts.push(result.text),
                Ok(_) => debug!("No text detected in image {}", i + 1),
                Err(e) if images.len() > 1 => warn!("OCR failed for image {}: {}", i + 1, e),
                Err(e) => return Err(e.into()),
            }
        }

        Ok((texts.join("\n\n"), engine.name().to_string()))
    }

    async fn parse_text(&self, text: &str) -> Result<Nfse> {
        if self.options.ai_parse {
            let parser = AiNfseParser::new(self.language_model()?)
                .with_max_tokens(self.config.ai.max_tokens);
            Ok(parser.parse(text).await?.nfse)
        } else {
            let parser = RuleBasedParser::new()
                .with_document_validation(self.config.extraction.validate_documents);
            Ok(parser.parse(text)?.nfse)
        }
    }

    async fn extract_with_vision(&self) -> Result<Nfse> {
        let data = fs::read(&self.path)?;
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let model = self.language_model()?;
        info!("Sending {} byte image to {}", data.len(), model.model_name());

        let request = CompletionRequest {
            system: prompts::STRUCTURED_DATA_SYSTEM.to_string(),
            content: vec![
                ContentBlock::image(ai::media_type_for(extension), &data),
                ContentBlock::Text(prompts::STRUCTURED_IMAGE_USER.to_string()),
            ],
            max_tokens: self.config.ai.max_tokens,
        };

        let answer = model.complete(&request).await?;
        let mut nfse = ai::parse_model_json(&answer)?;

        nfse.metadata.source_type = SourceType::Image;
        nfse.metadata.extraction_mode = ExtractionMode::AiVision;
        nfse.metadata.parse_mode = ParseMode::Ai;
        nfse.metadata.ai_model = Some(model.model_name().to_string());
        nfse.metadata.warnings = nfse.validate();

        Ok(nfse)
    }

    fn language_model(&self) -> Result<Arc<dyn LanguageModel>> {
        match &self.language_model {
            Some(model) => Ok(Arc::clone(model)),
            None => Ok(Arc::new(AnthropicClient::from_config(&self.config.ai)?)),
        }
    }
}

#[cfg(feature = "native")]
fn default_ocr_engine(config: &NfseConfig) -> std::result::Result<Box<dyn OcrEngine>, OcrError> {
    Ok(Box::new(crate::ocr::PureOcrEngine::from_config(&config.ocr)?))
}

#[cfg(not(feature = "native"))]
fn default_ocr_engine(_config: &NfseConfig) -> std::result::Result<Box<dyn OcrEngine>, OcrError> {
    Err(OcrError::Unavailable)
}
