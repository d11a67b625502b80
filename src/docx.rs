//! DOCX generation from classified lines.
//!
//! Headings map to heading styles, list items to shared numbering
//! definitions, body lines to plain paragraphs with indentation as a left
//! margin. Output is deterministic for identical input.

use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText, LineSpacing,
    NumberFormat, Numbering, NumberingId, Paragraph, Run, RunFonts, SpecialIndentType, Start,
    Style, StyleType,
};

use crate::config::LayoutParams;
use crate::error::ApiError;
use crate::layout::{strip_list_marker, ClassifiedLine, ClassifiedPage, LineRole, ListKind};

/// Universal font, applied across all script ranges so Cyrillic text renders.
const FONT_NAME: &str = "Arial";

pub(crate) const NUMBERED_NUM_ID: usize = 1;
pub(crate) const BULLET_NUM_ID: usize = 2;

/// Twips of left margin per indentation level (0.5 inch).
const INDENT_TWIPS_PER_LEVEL: u32 = 720;

/// Placeholder paragraph for a page the engine found nothing on.
const EMPTY_PAGE_TEXT: &str = "(no text recognized)";

/// Build one document from classified pages; a page break separates pages.
pub fn build_from_pages(pages: &[ClassifiedPage], params: &LayoutParams) -> Result<Vec<u8>, ApiError> {
    let mut docx = base_document();

    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            docx = docx.add_paragraph(
                Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
            );
        }
        if page.lines.is_empty() {
            docx = docx.add_paragraph(body_paragraph(EMPTY_PAGE_TEXT, 11.0, 0, None));
            continue;
        }

        let mut prev: Option<&ClassifiedLine> = None;
        for classified in &page.lines {
            let space_before = spacing_before(classified, prev, page.stats.median_height, params);
            docx = docx.add_paragraph(line_paragraph(classified, space_before));
            prev = Some(classified);
        }
    }

    pack(docx)
}

/// Base document with the style and numbering definitions both writers share.
pub(crate) fn base_document() -> Docx {
    let mut decimal = AbstractNumbering::new(NUMBERED_NUM_ID);
    let mut bullet = AbstractNumbering::new(BULLET_NUM_ID);
    for level in 0..=3usize {
        let indent = (INDENT_TWIPS_PER_LEVEL * (level as u32 + 1)) as i32;
        decimal = decimal.add_level(
            Level::new(
                level,
                Start::new(1),
                NumberFormat::new("decimal"),
                LevelText::new(format!("%{}.", level + 1)),
                LevelJc::new("left"),
            )
            .indent(Some(indent), Some(SpecialIndentType::Hanging(360)), None, None),
        );
        bullet = bullet.add_level(
            Level::new(
                level,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new("•"),
                LevelJc::new("left"),
            )
            .indent(Some(indent), Some(SpecialIndentType::Hanging(360)), None, None),
        );
    }

    Docx::new()
        .add_style(
            Style::new("Heading2", StyleType::Paragraph)
                .name("Heading 2")
                .bold(),
        )
        .add_style(
            Style::new("Heading3", StyleType::Paragraph)
                .name("Heading 3")
                .bold(),
        )
        .add_abstract_numbering(decimal)
        .add_abstract_numbering(bullet)
        .add_numbering(Numbering::new(NUMBERED_NUM_ID, NUMBERED_NUM_ID))
        .add_numbering(Numbering::new(BULLET_NUM_ID, BULLET_NUM_ID))
}

/// Serialize; the container layout is stable, so identical trees produce
/// identical bytes.
pub(crate) fn pack(docx: Docx) -> Result<Vec<u8>, ApiError> {
    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|e| ApiError::Docx(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn line_paragraph(classified: &ClassifiedLine, space_before_pt: Option<f32>) -> Paragraph {
    let text = classified.line.text.trim();

    let mut paragraph = match classified.role {
        LineRole::ListItem(kind) => {
            let stripped = strip_list_marker(text, kind);
            let num_id = match kind {
                ListKind::Numbered => NUMBERED_NUM_ID,
                ListKind::Bulleted => BULLET_NUM_ID,
            };
            Paragraph::new()
                .add_run(styled_run(&stripped, body_size_pt(classified.font_size_pt), false))
                .numbering(
                    NumberingId::new(num_id),
                    IndentLevel::new(classified.indent_level as usize),
                )
        }
        LineRole::Heading(level) => {
            let style = if level <= 2 { "Heading2" } else { "Heading3" };
            let size = heading_size_pt(classified.font_size_pt);
            let mut p = Paragraph::new()
                .style(style)
                .add_run(styled_run(text, size, true));
            if classified.indent_level > 0 {
                p = p.indent(
                    Some((classified.indent_level * INDENT_TWIPS_PER_LEVEL) as i32),
                    None,
                    None,
                    None,
                );
            }
            p
        }
        LineRole::Body => body_paragraph(
            text,
            body_size_pt(classified.font_size_pt),
            classified.indent_level,
            None,
        ),
    };

    if let Some(pt) = space_before_pt {
        paragraph = paragraph.line_spacing(LineSpacing::new().before((pt * 20.0) as u32));
    }
    paragraph
}

fn body_paragraph(
    text: &str,
    size_pt: f32,
    indent_level: u32,
    space_before_pt: Option<f32>,
) -> Paragraph {
    let mut p = Paragraph::new().add_run(styled_run(text, size_pt, false));
    if indent_level > 0 {
        p = p.indent(
            Some((indent_level * INDENT_TWIPS_PER_LEVEL) as i32),
            None,
            None,
            None,
        );
    }
    if let Some(pt) = space_before_pt {
        p = p.line_spacing(LineSpacing::new().before((pt * 20.0) as u32));
    }
    p
}

pub(crate) fn styled_run(text: &str, size_pt: f32, bold: bool) -> Run {
    let mut run = Run::new()
        .add_text(text)
        .fonts(
            RunFonts::new()
                .ascii(FONT_NAME)
                .hi_ansi(FONT_NAME)
                .east_asia(FONT_NAME)
                .cs(FONT_NAME),
        )
        .size((size_pt * 2.0) as usize);
    if bold {
        run = run.bold();
    }
    run
}

fn heading_size_pt(estimated_pt: f32) -> f32 {
    (estimated_pt + 2.0).clamp(12.0, 18.0)
}

fn body_size_pt(estimated_pt: f32) -> f32 {
    estimated_pt.clamp(10.0, 14.0)
}

/// Extra space before a paragraph when the source lines were visibly apart.
fn spacing_before(
    current: &ClassifiedLine,
    prev: Option<&ClassifiedLine>,
    median_height: u32,
    params: &LayoutParams,
) -> Option<f32> {
    let prev = prev?;
    let gap = current
        .line
        .bbox
        .top
        .saturating_sub(prev.line.bbox.bottom());
    if gap as f32 > median_height as f32 * params.gap_spacing_factor {
        Some((gap as f32 / 5.0).clamp(3.0, 12.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{classify_page, PageStats};
    use crate::ocr::{BoundingBox, RecognizedLine};
    use std::io::Read;

    fn line(text: &str, left: u32, top: u32, width: u32, height: u32) -> RecognizedLine {
        RecognizedLine {
            text: text.to_string(),
            bbox: BoundingBox {
                left,
                top,
                width,
                height,
            },
            confidence: 90.0,
        }
    }

    fn sample_page() -> ClassifiedPage {
        let lines = vec![
            line("DOCUMENT TITLE", 0, 10, 400, 42),
            line("First body paragraph of the page.", 0, 100, 1000, 20),
            line("1. first item", 0, 140, 500, 20),
            line("- second item", 0, 180, 500, 20),
            line("indented note", 210, 300, 400, 20),
            line("body", 0, 340, 900, 20),
            line("tail", 0, 372, 900, 20),
        ];
        classify_page(lines, &LayoutParams::default())
    }

    fn document_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut file = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_output_is_deterministic() {
        let pages = vec![sample_page()];
        let params = LayoutParams::default();
        let a = build_from_pages(&pages, &params).unwrap();
        let b = build_from_pages(&pages, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_document_contains_expected_structures() {
        let pages = vec![sample_page()];
        let bytes = build_from_pages(&pages, &LayoutParams::default()).unwrap();
        let xml = document_xml(&bytes);

        assert!(xml.contains("Heading2"), "heading style missing");
        assert!(xml.contains("numId"), "list numbering missing");
        assert!(xml.contains("DOCUMENT TITLE"));
        assert!(xml.contains("first item"));
        // marker stripped, numbering renders it
        assert!(!xml.contains("1. first item"));
    }

    #[test]
    fn test_multi_page_inserts_page_break() {
        let pages = vec![sample_page(), sample_page()];
        let bytes = build_from_pages(&pages, &LayoutParams::default()).unwrap();
        let xml = document_xml(&bytes);
        assert!(xml.contains(r#"w:type="page""#));
    }

    #[test]
    fn test_empty_page_gets_placeholder() {
        let pages = vec![ClassifiedPage {
            lines: vec![],
            stats: PageStats::from_lines(&[]),
        }];
        let bytes = build_from_pages(&pages, &LayoutParams::default()).unwrap();
        assert!(document_xml(&bytes).contains(EMPTY_PAGE_TEXT));
    }

    #[test]
    fn test_spacing_only_after_wide_gaps() {
        let params = LayoutParams::default();
        let page = sample_page();
        // "First body paragraph" sits 48px below the 42px-tall title bottom
        let first_body = &page.lines[1];
        let title = &page.lines[0];
        assert!(spacing_before(first_body, Some(title), page.stats.median_height, &params)
            .is_some());
        // tightly stacked body lines stay untouched
        let tail = &page.lines[6];
        let body = &page.lines[5];
        assert!(spacing_before(tail, Some(body), page.stats.median_height, &params).is_none());
        assert!(spacing_before(first_body, None, page.stats.median_height, &params).is_none());
    }

    #[test]
    fn test_size_clamps() {
        assert_eq!(heading_size_pt(9.0), 12.0);
        assert_eq!(heading_size_pt(28.0), 18.0);
        assert_eq!(body_size_pt(9.0), 10.0);
        assert_eq!(body_size_pt(28.0), 14.0);
    }
}
