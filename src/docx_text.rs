//! Text-only DOCX path.
//!
//! No OCR, no geometry: each raw text line is classified by shape alone
//! (leading markers, uppercase share) and rendered with the same style and
//! numbering definitions as the image path.

use docx_rs::{IndentLevel, NumberingId, Paragraph};

use crate::docx::{base_document, pack, styled_run, BULLET_NUM_ID, NUMBERED_NUM_ID};
use crate::error::ApiError;
use crate::layout::{detect_list_marker, strip_list_marker, ListKind};

const DEFAULT_FONT_PT: f32 = 11.0;
const HEADING_FONT_PT: f32 = 14.0;

/// Role a raw text line takes in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Heading,
    ListItem(ListKind),
    Body,
}

/// Classify a single non-blank text line. Markers win over the heading
/// heuristic; anything ambiguous is body.
pub fn classify_text_line(line: &str) -> TextRole {
    let s = line.trim();
    if let Some(kind) = detect_list_marker(s) {
        return TextRole::ListItem(kind);
    }
    if looks_like_heading(s) {
        return TextRole::Heading;
    }
    TextRole::Body
}

/// Short line with a high uppercase share reads as a heading.
fn looks_like_heading(s: &str) -> bool {
    let len = s.chars().count();
    if len == 0 || len > 60 {
        return false;
    }
    let upper = s.chars().filter(|c| c.is_uppercase()).count();
    upper >= 3.max(len / 4)
}

/// Build a DOCX from raw text. Blank-line runs collapse into one spacer
/// paragraph; all other lines become styled paragraphs.
pub fn build_from_text(text: &str) -> Result<Vec<u8>, ApiError> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut docx = base_document();

    if normalized.trim().is_empty() {
        docx = docx.add_paragraph(Paragraph::new());
        return pack(docx);
    }

    let mut blank_streak = false;
    for raw in normalized.lines() {
        let line = raw.trim();
        if line.is_empty() {
            blank_streak = true;
            continue;
        }
        if blank_streak {
            docx = docx.add_paragraph(Paragraph::new());
            blank_streak = false;
        }

        let paragraph = match classify_text_line(line) {
            TextRole::ListItem(kind) => {
                let num_id = match kind {
                    ListKind::Numbered => NUMBERED_NUM_ID,
                    ListKind::Bulleted => BULLET_NUM_ID,
                };
                Paragraph::new()
                    .add_run(styled_run(
                        &strip_list_marker(line, kind),
                        DEFAULT_FONT_PT,
                        false,
                    ))
                    .numbering(NumberingId::new(num_id), IndentLevel::new(0))
            }
            TextRole::Heading => Paragraph::new()
                .style("Heading2")
                .add_run(styled_run(line, HEADING_FONT_PT, true)),
            TextRole::Body => {
                Paragraph::new().add_run(styled_run(line, DEFAULT_FONT_PT, false))
            }
        };
        docx = docx.add_paragraph(paragraph);
    }

    pack(docx)
}
