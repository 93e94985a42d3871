//! OCR engine backed by `pure-onnx-ocr`.

use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{OcrEngine, OcrResult, TextBox};

/// PaddleOCR detection + recognition in pure Rust, no external ONNX Runtime.
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl PureOcrEngine {
    /// Load the models named in the configuration.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let det_path = config.model_path(&config.detection_model);
        let rec_path = config.model_path(&config.recognition_model);
        let dict_path = config.model_path(&config.dictionary);

        if [&det_path, &rec_path, &dict_path].iter().any(|p| !p.is_file()) {
            return Err(OcrError::ModelsNotFound(config.model_dir.clone()));
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded OCR models from {}", config.model_dir.display());

        Ok(Self { engine })
    }
}

impl OcrEngine for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let boxes = results
            .iter()
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: r.text.replace("[UNK]", " "),
                confidence: r.confidence,
            })
            .collect();

        let result = OcrResult::from_boxes(
            boxes,
            (width, height),
            start.elapsed().as_millis() as u64,
        );

        info!(
            "OCR complete: {} text boxes in {}ms",
            result.boxes.len(),
            result.processing_time_ms
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        "pure-onnx-ocr"
    }
}

/// First four exterior points of the polygon as `[x1, y1, ..., x4, y4]`.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
