//! Service configuration, read once from the environment at startup.
//!
//! All layout-heuristic thresholds are tuned values carried as explicit
//! parameters with defaults, overridable via `SMARTOCR_*` variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address the server binds to.
    pub bind_addr: String,
    /// Directory scratch uploads are written into (created if missing).
    pub upload_dir: PathBuf,
    /// Optional directory preprocessed images are dumped into for inspection.
    pub debug_dir: Option<PathBuf>,
    /// Explicit tesseract binary override (checked before PATH probing).
    pub tesseract_cmd: Option<PathBuf>,
    /// Layout heuristic parameters.
    pub layout: LayoutParams,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let upload_dir = PathBuf::from(
            std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
        );
        std::fs::create_dir_all(&upload_dir)
            .with_context(|| format!("failed to create upload dir {:?}", upload_dir))?;

        let debug_dir = std::env::var("OCR_DEBUG_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let tesseract_cmd = std::env::var("TESSERACT_CMD")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            upload_dir,
            debug_dir,
            tesseract_cmd,
            layout: LayoutParams::from_env(),
        })
    }
}

/// Tuned thresholds for the layout heuristics.
///
/// Defaults come from the empirically tuned values of the production service;
/// they are parameters, not derived quantities.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutParams {
    /// A line is a heading only if bbox_height / median_height is strictly
    /// greater than this.
    pub heading_ratio: f32,
    /// Ratio above which a heading is promoted one level.
    pub heading_major_ratio: f32,
    /// A heading must span at most this fraction of the page width.
    pub heading_max_width_ratio: f32,
    /// Pixels of left-edge offset per indentation level.
    pub indent_step_px: u32,
    /// Indentation levels are capped here.
    pub max_indent_level: u32,
    /// Vertical gaps larger than this multiple of the median line height get
    /// extra paragraph spacing.
    pub gap_spacing_factor: f32,
    /// Intra-line word gaps wider than this multiple of the line height are
    /// rendered as a double space.
    pub word_gap_factor: f32,
    /// Minimum OSD orientation confidence before auto-rotation applies.
    pub min_osd_confidence: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            heading_ratio: 1.5,
            heading_major_ratio: 2.0,
            heading_max_width_ratio: 0.75,
            indent_step_px: 100,
            max_indent_level: 3,
            gap_spacing_factor: 0.8,
            word_gap_factor: 1.2,
            min_osd_confidence: 1.0,
        }
    }
}

impl LayoutParams {
    /// Defaults with optional `SMARTOCR_*` overrides.
    pub fn from_env() -> Self {
        let mut p = Self::default();
        override_f32("SMARTOCR_HEADING_RATIO", &mut p.heading_ratio);
        override_f32("SMARTOCR_HEADING_MAJOR_RATIO", &mut p.heading_major_ratio);
        override_f32(
            "SMARTOCR_HEADING_MAX_WIDTH_RATIO",
            &mut p.heading_max_width_ratio,
        );
        override_u32("SMARTOCR_INDENT_STEP_PX", &mut p.indent_step_px);
        override_u32("SMARTOCR_MAX_INDENT_LEVEL", &mut p.max_indent_level);
        override_f32("SMARTOCR_GAP_SPACING_FACTOR", &mut p.gap_spacing_factor);
        override_f32("SMARTOCR_WORD_GAP_FACTOR", &mut p.word_gap_factor);
        override_f32("SMARTOCR_MIN_OSD_CONFIDENCE", &mut p.min_osd_confidence);
        p
    }
}

fn override_f32(var: &str, slot: &mut f32) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!("ignoring non-numeric {}={}", var, raw),
        }
    }
}

fn override_u32(var: &str, slot: &mut u32) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!("ignoring non-numeric {}={}", var, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let p = LayoutParams::default();
        assert_eq!(p.heading_ratio, 1.5);
        assert_eq!(p.indent_step_px, 100);
        assert_eq!(p.max_indent_level, 3);
    }

    #[test]
    fn test_override_parses() {
        let mut v = 1.5f32;
        std::env::set_var("SMARTOCR_TEST_RATIO", "2.25");
        override_f32("SMARTOCR_TEST_RATIO", &mut v);
        assert_eq!(v, 2.25);
        std::env::remove_var("SMARTOCR_TEST_RATIO");
    }

    #[test]
    fn test_override_rejects_garbage() {
        let mut v = 7u32;
        std::env::set_var("SMARTOCR_TEST_STEP", "not-a-number");
        override_u32("SMARTOCR_TEST_STEP", &mut v);
        assert_eq!(v, 7);
        std::env::remove_var("SMARTOCR_TEST_STEP");
    }
}
