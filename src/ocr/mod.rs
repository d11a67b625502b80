//! OCR adapter.
//!
//! Wraps the Tesseract engine behind two operations: plain-text recognition
//! and per-line recognition with geometry. Both share the same preparation
//! pass (normalize, optional auto-rotate, debug dump).

pub mod data;
pub mod engine;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::preprocess;
use crate::scratch::ScratchFile;

pub use engine::{expand_lang, TesseractEngine};

/// Pixel-space rectangle reported by the engine for a recognized line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// One recognized line of text with geometry and mean word confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// The OCR adapter: resolved engine plus the preprocessing knobs it needs.
#[derive(Debug, Clone)]
pub struct Recognizer {
    engine: TesseractEngine,
    debug_dir: Option<PathBuf>,
    word_gap_factor: f32,
    min_osd_confidence: f32,
}

impl Recognizer {
    pub fn new(engine: TesseractEngine, config: &AppConfig) -> Self {
        Self {
            engine,
            debug_dir: config.debug_dir.clone(),
            word_gap_factor: config.layout.word_gap_factor,
            min_osd_confidence: config.layout.min_osd_confidence,
        }
    }

    /// Image file → normalized plain text.
    pub async fn recognize_text(
        &self,
        scratch: &ScratchFile,
        lang: &str,
    ) -> Result<String, ApiError> {
        let lang = expand_lang(lang);
        let prepared = self.prepare(scratch).await?;
        self.engine.image_to_text(prepared.path(), &lang).await
    }

    /// Image file → recognized lines with geometry, in reading order.
    pub async fn recognize_lines(
        &self,
        scratch: &ScratchFile,
        lang: &str,
    ) -> Result<Vec<RecognizedLine>, ApiError> {
        let lang = expand_lang(lang);
        let prepared = self.prepare(scratch).await?;
        let tsv = self.engine.image_to_tsv(prepared.path(), &lang).await?;
        let lines = data::parse_tsv(&tsv, self.word_gap_factor);
        info!("recognized {} lines from {:?}", lines.len(), scratch.path());
        Ok(lines)
    }

    /// Decode + normalize the upload, write the engine input image, and apply
    /// auto-rotation when the OSD probe is confident enough. The returned
    /// scratch guard removes the derived image with the request.
    async fn prepare(&self, scratch: &ScratchFile) -> Result<ScratchFile, ApiError> {
        let src = scratch.path().to_path_buf();
        let mut img = tokio::task::spawn_blocking(move || {
            preprocess::load(&src).map(|decoded| preprocess::normalize(&decoded))
        })
        .await
        .map_err(|e| ApiError::Ocr(format!("preprocessing task failed: {e}")))??;

        let prepared = ScratchFile::adopt(scratch.sibling("_pre.png"));
        img.save(prepared.path())
            .map_err(|e| ApiError::Ocr(format!("failed to write engine input image: {e}")))?;

        match self.engine.orientation(prepared.path()).await {
            Ok(osd) if osd.rotate != 0 && osd.confidence >= self.min_osd_confidence => {
                info!(
                    "auto-rotating {:?} by {} degrees (confidence {:.2})",
                    scratch.path(),
                    osd.rotate,
                    osd.confidence
                );
                img = preprocess::apply_rotation(img, osd.rotate);
                img.save(prepared.path()).map_err(|e| {
                    ApiError::Ocr(format!("failed to rewrite rotated image: {e}"))
                })?;
            }
            Ok(osd) => {
                debug!(
                    "keeping orientation (rotate={}, confidence={:.2})",
                    osd.rotate, osd.confidence
                );
            }
            Err(e) => {
                // Orientation detection is best-effort on sparse images
                debug!("OSD probe unavailable: {}", e);
            }
        }

        if let Some(dir) = &self.debug_dir {
            let stem = scratch
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("img");
            preprocess::save_debug(&img, dir, stem);
        }

        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_edges() {
        let b = BoundingBox {
            left: 10,
            top: 20,
            width: 100,
            height: 30,
        };
        assert_eq!(b.right(), 110);
        assert_eq!(b.bottom(), 50);
    }
}
