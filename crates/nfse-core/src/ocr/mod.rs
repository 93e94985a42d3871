//! OCR for scanned documents and photos.

mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;

pub use preprocessing::ImagePreprocessor;
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Rows closer than this (in pixels) are read as one line.
const ROW_HEIGHT: f32 = 20.0;

/// A text recognition backend.
///
/// Engines may keep interior caches and are used from a single thread.
pub trait OcrEngine {
    /// Recognize text in an already preprocessed image.
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError>;

    /// Short engine name recorded in the extraction metadata.
    fn name(&self) -> &str;
}

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Quadrilateral corners (x1, y1, x2, y2, x3, y3, x4, y4).
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Result of OCR processing on an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text boxes.
    pub boxes: Vec<TextBox>,

    /// Full text in reading order.
    pub text: String,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl OcrResult {
    /// Create an empty result.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            boxes: Vec::new(),
            text: String::new(),
            processing_time_ms: 0,
            image_size: (width, height),
        }
    }

    /// Build a result from unordered boxes.
    pub fn from_boxes(boxes: Vec<TextBox>, image_size: (u32, u32), processing_time_ms: u64) -> Self {
        let mut result = Self {
            boxes,
            text: String::new(),
            processing_time_ms,
            image_size,
        };
        result.sort_by_reading_order();
        result
    }

    /// Mean confidence across boxes, 0.0 when nothing was found.
    pub fn mean_confidence(&self) -> f32 {
        if self.boxes.is_empty() {
            return 0.0;
        }
        self.boxes.iter().map(|b| b.confidence).sum::<f32>() / self.boxes.len() as f32
    }

    /// Sort boxes top-to-bottom, left-to-right and rebuild the text.
    ///
    /// Boxes on the same row are joined with a space so that a label and
    /// its value stay on one line.
    pub fn sort_by_reading_order(&mut self) {
        self.boxes.sort_by(|a, b| {
            let (ax, ay, _, _) = a.rect();
            let (bx, by, _, _) = b.rect();

            let row_a = (ay / ROW_HEIGHT) as i32;
            let row_b = (by / ROW_HEIGHT) as i32;

            row_a
                .cmp(&row_b)
                .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
        });

        let mut lines: Vec<String> = Vec::new();
        let mut current_row = None;
        for text_box in &self.boxes {
            let text = text_box.text.trim();
            if text.is_empty() {
                continue;
            }
            let row = (text_box.rect().1 / ROW_HEIGHT) as i32;
            match lines.last_mut() {
                Some(line) if current_row == Some(row) => {
                    line.push(' ');
                    line.push_str(text);
                }
                _ => lines.push(text.to_string()),
            }
            current_row = Some(row);
        }

        self.text = lines.join("\n");
    }
}
