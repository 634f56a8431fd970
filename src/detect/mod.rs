mod geom;
pub mod group;
mod merge;
mod parse;
mod preprocess;
mod tesseract;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::io::Write;
use tracing::debug;

use crate::region::TextBlock;

pub use group::{DEFAULT_GROUP_THRESHOLD, group_blocks, merge_group};
pub use tesseract::list_tesseract_languages;

/// Finds text regions on a page together with their source text.
pub trait Detector: Send + Sync {
    /// Blocks in reading order (top-to-bottom, then left-to-right).
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBlock>>;
}

#[derive(Debug, Clone)]
pub struct TesseractDetector {
    languages: String,
    psm: u32,
    min_confidence: f32,
}

impl TesseractDetector {
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
            psm: 11,
            min_confidence: 30.0,
        }
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl Detector for TesseractDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBlock>> {
        let (width, height) = image.dimensions();
        let scale = preprocess::ocr_scale(width);
        let languages = tesseract::resolve_ocr_languages(&self.languages)?;

        let mut lines = Vec::new();
        for ocr_image in preprocess::preprocess_for_ocr_variants(image, scale) {
            let mut tmp = tempfile::Builder::new()
                .suffix(".png")
                .tempfile()
                .with_context(|| "failed to create temp file for OCR")?;
            ocr_image
                .write_to(&mut tmp, image::ImageFormat::Png)
                .with_context(|| "failed to write temp image for OCR")?;
            tmp.flush().ok();

            let tsv = tesseract::run_tesseract_tsv(tmp.path(), &languages, self.psm)?;
            let parsed = parse::parse_tsv_lines(&tsv)?;
            debug!("tesseract pass found {} lines", parsed.len());
            lines = merge::merge_lines(lines, parsed);
        }

        let lines = merge::scale_lines(lines, scale);
        let lines = merge::filter_lines(lines, width, height, self.min_confidence);
        let lines = merge::merge_inline_lines(lines);
        let lines = merge::suppress_overlaps(lines);
        Ok(merge::assign_orientation(lines))
    }
}
