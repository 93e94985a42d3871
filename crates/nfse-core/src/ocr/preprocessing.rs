//! Image preprocessing for OCR.

use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use image::imageops::FilterType;
use tracing::debug;

use crate::models::config::OcrConfig;

/// Prepares photos and scans for recognition: grayscale, upscale, binarize.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    upscale_min_width: u32,
    upscale_target_width: u32,
    binarize: bool,
    block_size: u32,
    offset: i32,
}

impl ImagePreprocessor {
    /// Create a preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(&OcrConfig::default())
    }

    /// Create a preprocessor from OCR configuration.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            upscale_min_width: config.upscale_min_width,
            upscale_target_width: config.upscale_target_width,
            binarize: config.binarize,
            // Block must be odd and at least 3.
            block_size: (config.threshold_block_size.max(3)) | 1,
            offset: config.threshold_offset,
        }
    }

    /// Enable or disable adaptive thresholding.
    pub fn with_binarize(mut self, binarize: bool) -> Self {
        self.binarize = binarize;
        self
    }

    /// Run the full preprocessing chain.
    pub fn process(&self, image: &DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        let gray = image.to_luma8();

        let (new_width, new_height) = self.calculate_resize_dimensions(width, height);
        let gray = if (new_width, new_height) != (width, height) {
            debug!(
                "Upscaling image {}x{} -> {}x{}",
                width, height, new_width, new_height
            );
            image::imageops::resize(&gray, new_width, new_height, FilterType::CatmullRom)
        } else {
            gray
        };

        if self.binarize {
            DynamicImage::ImageLuma8(self.adaptive_threshold(&gray))
        } else {
            DynamicImage::ImageLuma8(gray)
        }
    }

    fn calculate_resize_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || width >= self.upscale_min_width {
            return (width, height);
        }

        let scale = self.upscale_target_width as f32 / width as f32;
        let new_width = self.upscale_target_width;
        let new_height = (height as f32 * scale).round() as u32;

        (new_width.max(1), new_height.max(1))
    }

    /// Local mean threshold: a pixel is white when brighter than the mean of
    /// its block minus the offset.
    fn adaptive_threshold(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let mut result = GrayImage::new(width, height);
        if width == 0 || height == 0 {
            return result;
        }

        let integral = integral_image(image);
        let stride = width as usize + 1;
        let half_block = self.block_size / 2;

        for y in 0..height {
            let y0 = y.saturating_sub(half_block) as usize;
            let y1 = (y + half_block + 1).min(height) as usize;
            for x in 0..width {
                let x0 = x.saturating_sub(half_block) as usize;
                let x1 = (x + half_block + 1).min(width) as usize;

                let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                    - integral[y0 * stride + x1]
                    - integral[y1 * stride + x0];
                let count = ((y1 - y0) * (x1 - x0)) as u64;

                let threshold = (sum / count) as i32 - self.offset;
                let pixel_value = image.get_pixel(x, y)[0] as i32;

                let output = if pixel_value > threshold { 255 } else { 0 };
                result.put_pixel(x, y, Luma([output]));
            }
        }

        result
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Summed-area table with one row and column of zero padding.
fn integral_image(image: &GrayImage) -> Vec<u64> {
    let (width, height) = image.dimensions();
    let stride = width as usize + 1;
    let mut table = vec![0u64; stride * (height as usize + 1)];

    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row_sum;
        }
    }

    table
}
