//! Layout heuristics over recognized-line geometry.
//!
//! Classifies each line as heading, list item, or body and derives an
//! indentation level. Every rule is a pure function of the line's own
//! geometry plus page-wide statistics, so classification does not depend on
//! the order lines are presented in.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::LayoutParams;
use crate::ocr::{BoundingBox, RecognizedLine};

/// Rendered DPI assumed when converting pixel heights to point sizes.
const ASSUMED_DPI: f32 = 300.0;
const MIN_FONT_PT: f32 = 9.0;
const MAX_FONT_PT: f32 = 28.0;

const BULLET_MARKERS: &[char] = &['•', '-', '·', '*', '○', '■', '►'];

static NUMBERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}[.)\s]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bulleted,
    Numbered,
}

/// Role assigned to a line by the heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    /// Word-processing heading level (2 or 3).
    Heading(u8),
    ListItem(ListKind),
    Body,
}

/// A recognized line augmented with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    pub line: RecognizedLine,
    pub role: LineRole,
    pub indent_level: u32,
    pub font_size_pt: f32,
}

/// Page-wide statistics the per-line rules compare against. Computed from the
/// full line set with order-insensitive reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub median_height: u32,
    pub min_left: u32,
    pub page_width: u32,
}

impl PageStats {
    pub fn from_lines(lines: &[RecognizedLine]) -> Self {
        if lines.is_empty() {
            return Self {
                median_height: 16,
                min_left: 0,
                page_width: 0,
            };
        }
        let mut heights: Vec<u32> = lines.iter().map(|l| l.bbox.height).collect();
        heights.sort_unstable();
        let median_height = heights[heights.len() / 2].max(1);

        let min_left = lines.iter().map(|l| l.bbox.left).min().unwrap_or(0);
        let max_right = lines.iter().map(|l| l.bbox.right()).max().unwrap_or(0);

        Self {
            median_height,
            min_left,
            page_width: max_right.saturating_sub(min_left),
        }
    }
}

/// A page of classified lines plus the stats they were classified against.
#[derive(Debug, Clone)]
pub struct ClassifiedPage {
    pub lines: Vec<ClassifiedLine>,
    pub stats: PageStats,
}

/// Classify a whole page. Lines keep their input order.
pub fn classify_page(lines: Vec<RecognizedLine>, params: &LayoutParams) -> ClassifiedPage {
    let stats = PageStats::from_lines(&lines);
    let lines = lines
        .into_iter()
        .map(|line| classify_line(line, &stats, params))
        .collect();
    ClassifiedPage { lines, stats }
}

/// Classify one line against page statistics. List markers win over size;
/// size only makes a heading when strictly above the threshold AND the line
/// is short relative to the page width. Everything ambiguous is body.
pub fn classify_line(
    line: RecognizedLine,
    stats: &PageStats,
    params: &LayoutParams,
) -> ClassifiedLine {
    let font_size_pt = px_to_pt(line.bbox.height);
    let indent_level = indent_level(line.bbox.left, stats, params);

    let role = if let Some(kind) = detect_list_marker(&line.text) {
        LineRole::ListItem(kind)
    } else if is_heading_geometry(&line.bbox, stats, params) {
        let ratio = height_ratio(&line.bbox, stats);
        if ratio > params.heading_major_ratio {
            LineRole::Heading(2)
        } else {
            LineRole::Heading(3)
        }
    } else {
        LineRole::Body
    };

    ClassifiedLine {
        line,
        role,
        indent_level,
        font_size_pt,
    }
}

fn height_ratio(bbox: &BoundingBox, stats: &PageStats) -> f32 {
    bbox.height as f32 / stats.median_height as f32
}

/// The threshold is exclusive: a ratio exactly at `heading_ratio` is not a
/// heading.
fn is_heading_geometry(bbox: &BoundingBox, stats: &PageStats, params: &LayoutParams) -> bool {
    if height_ratio(bbox, stats) <= params.heading_ratio {
        return false;
    }
    if stats.page_width == 0 {
        return false;
    }
    bbox.width as f32 <= params.heading_max_width_ratio * stats.page_width as f32
}

fn indent_level(left: u32, stats: &PageStats, params: &LayoutParams) -> u32 {
    if params.indent_step_px == 0 {
        return 0;
    }
    let offset = left.saturating_sub(stats.min_left);
    (offset / params.indent_step_px).min(params.max_indent_level)
}

/// Does the text open with a bullet or numbered-list marker?
pub fn detect_list_marker(text: &str) -> Option<ListKind> {
    let s = text.trim_start();
    if s.starts_with(BULLET_MARKERS) {
        return Some(ListKind::Bulleted);
    }
    if NUMBERED_MARKER.is_match(s) {
        return Some(ListKind::Numbered);
    }
    None
}

/// Remove the leading marker; the list numbering renders its own.
pub fn strip_list_marker(text: &str, kind: ListKind) -> String {
    let s = text.trim_start();
    match kind {
        ListKind::Bulleted => s
            .trim_start_matches(|c: char| BULLET_MARKERS.contains(&c) || c == ' ')
            .to_string(),
        ListKind::Numbered => NUMBERED_MARKER.replace(s, "").trim_start().to_string(),
    }
}

/// Pixel height to point size at the assumed scan DPI, clamped to a sane
/// document range.
pub fn px_to_pt(px: u32) -> f32 {
    let pt = px as f32 / ASSUMED_DPI * 72.0;
    pt.clamp(MIN_FONT_PT, MAX_FONT_PT)
}
