//! PDF text and image extraction using lopdf and pdf-extract.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, PdfType, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Create an extractor and load `data` into it.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut extractor = Self::new();
        extractor.load(data)?;
        Ok(extractor)
    }

    fn document(&self) -> Result<&Document> {
        self.document.as_ref().ok_or(PdfError::NotLoaded)
    }

    /// Text of every page through lopdf, joined with newlines.
    fn extract_text_per_page(&self) -> Result<String> {
        let doc = self.document()?;
        let mut pages = Vec::new();

        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => pages.push(text),
                Err(e) => warn!("lopdf could not read page {}: {}", page_num, e),
            }
        }

        if pages.is_empty() {
            return Err(PdfError::TextExtraction("no readable pages".to_string()));
        }
        Ok(pages.join("\n"))
    }

    /// Every page's images, in page order.
    pub fn extract_all_page_images(&self) -> Result<Vec<DynamicImage>> {
        let mut images = Vec::new();
        for page in 1..=self.page_count() {
            images.extend(self.extract_images(page)?);
        }
        Ok(images)
    }

    fn try_extract_image_from_object(&self, doc: &Document, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        trace!("Found image object: {}x{}", width, height);

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Skipping image with unsupported filter");
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);

        if bits != 8 {
            trace!("Unsupported bits per component: {}", bits);
            return None;
        }

        image_from_raw(&data, width, height, color_space)
    }

    /// Resources dictionary for a page, following `Parent` inheritance.
    fn page_resources(&self, doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.page_resources(doc, *parent_id),
            _ => None,
        }
    }
}

/// Decode uncompressed 8-bit RGB or grayscale samples.
fn image_from_raw(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let rgb_len = pixels.checked_mul(3)?;

    let rgba: Vec<u8> = match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= rgb_len => data[..rgb_len]
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            data[..pixels].iter().flat_map(|&g| [g, g, g, 255]).collect()
        }
        _ => {
            trace!(
                "Could not decode image: colorspace={:?}, data_len={}",
                String::from_utf8_lossy(color_space),
                data.len()
            );
            return None;
        }
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn analyze(&self, min_text_length: usize) -> PdfType {
        let text_len = self.extract_text().map(|t| t.chars().count()).unwrap_or(0);
        if text_len >= min_text_length {
            return PdfType::Text;
        }

        let has_images = self
            .extract_all_page_images()
            .map(|images| !images.is_empty())
            .unwrap_or(false);

        let pdf_type = if has_images { PdfType::Scanned } else { PdfType::Empty };
        debug!("PDF analysis: {} chars of text, has_images={} -> {:?}", text_len, has_images, pdf_type);
        pdf_type
    }

    fn extract_text(&self) -> Result<String> {
        self.document()?;

        let text = match pdf_extract::extract_text_from_mem(&self.raw_data) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!("pdf-extract returned no text, trying lopdf");
                self.extract_text_per_page().unwrap_or_default()
            }
            Err(e) => {
                warn!("pdf-extract failed ({}), falling back to lopdf", e);
                self.extract_text_per_page()?
            }
        };

        Ok(text.trim().to_string())
    }

    fn extract_page_text(&self, page: u32) -> Result<String> {
        let doc = self.document()?;
        if !doc.get_pages().contains_key(&page) {
            return Err(PdfError::InvalidPage(page));
        }
        doc.extract_text(&[page])
            .map(|t| t.trim().to_string())
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn extract_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut images = Vec::new();

        if let Some(resources) = self.page_resources(doc, *page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = self.try_extract_image_from_object(doc, obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }
}
