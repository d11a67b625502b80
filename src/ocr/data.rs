//! TSV word-data parsing.
//!
//! Tesseract's `tsv` config emits one row per recognized word:
//! `level page block par line word left top width height conf text`.
//! Words (level 5) are grouped into lines keyed by (page, block, par, line),
//! joined left-to-right with gap-aware spacing, and ordered top-to-bottom.

use std::collections::BTreeMap;

use super::{BoundingBox, RecognizedLine};

const WORD_LEVEL: u32 = 5;

#[derive(Debug)]
struct Word {
    text: String,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    conf: f32,
}

/// Parse engine TSV output into ordered recognized lines.
///
/// `word_gap_factor`: horizontal gaps wider than this multiple of the line
/// height become a double space (column separation survives into the text).
pub fn parse_tsv(tsv: &str, word_gap_factor: f32) -> Vec<RecognizedLine> {
    let mut grouped: BTreeMap<(u32, u32, u32, u32), Vec<Word>> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        if let Some((key, word)) = parse_row(row) {
            grouped.entry(key).or_default().push(word);
        }
    }

    let mut lines: Vec<RecognizedLine> = grouped
        .into_values()
        .filter_map(|words| assemble_line(words, word_gap_factor))
        .collect();

    lines.sort_by_key(|l| (l.bbox.top, l.bbox.left));
    lines
}

fn parse_row(row: &str) -> Option<((u32, u32, u32, u32), Word)> {
    // splitn keeps any tabs inside the recognized text intact
    let fields: Vec<&str> = row.splitn(12, '\t').collect();
    if fields.len() < 12 {
        return None;
    }

    let level: u32 = fields[0].parse().ok()?;
    if level != WORD_LEVEL {
        return None;
    }

    let conf: f32 = fields[10].parse().ok()?;
    let text = fields[11].trim();
    if conf < 0.0 || text.is_empty() {
        return None;
    }

    let key = (
        fields[1].parse().ok()?, // page
        fields[2].parse().ok()?, // block
        fields[3].parse().ok()?, // par
        fields[4].parse().ok()?, // line
    );
    Some((
        key,
        Word {
            text: text.to_string(),
            left: fields[6].parse().ok()?,
            top: fields[7].parse().ok()?,
            width: fields[8].parse().ok()?,
            height: fields[9].parse().ok()?,
            conf,
        },
    ))
}

fn assemble_line(mut words: Vec<Word>, word_gap_factor: f32) -> Option<RecognizedLine> {
    if words.is_empty() {
        return None;
    }
    words.sort_by_key(|w| w.left);

    let left = words.iter().map(|w| w.left).min().unwrap_or(0);
    let top = words.iter().map(|w| w.top).min().unwrap_or(0);
    let right = words.iter().map(|w| w.left + w.width).max().unwrap_or(left);
    let bottom = words.iter().map(|w| w.top + w.height).max().unwrap_or(top);
    let height = bottom - top;

    let mut text = String::new();
    let mut prev_right: Option<u32> = None;
    for w in &words {
        if let Some(pr) = prev_right {
            let gap = w.left.saturating_sub(pr);
            if gap as f32 > height as f32 * word_gap_factor {
                text.push_str("  ");
            } else {
                text.push(' ');
            }
        }
        text.push_str(&w.text);
        prev_right = Some(w.left + w.width);
    }

    let confidence = words.iter().map(|w| w.conf).sum::<f32>() / words.len() as f32;

    Some(RecognizedLine {
        text,
        bbox: BoundingBox {
            left,
            top,
            width: right - left,
            height,
        },
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: u32, line: u32, word: u32, left: u32, top: u32, w: u32, h: u32, conf: f32, text: &str) -> String {
        format!("5\t1\t{block}\t1\t{line}\t{word}\t{left}\t{top}\t{w}\t{h}\t{conf}\t{text}")
    }

    #[test]
    fn test_words_grouped_into_lines() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, 50, 18, 95.0, "Hello"),
            word_row(1, 1, 2, 70, 20, 60, 18, 90.0, "world"),
            word_row(1, 2, 1, 10, 60, 40, 18, 88.0, "next"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv, 1.2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello world");
        assert_eq!(lines[1].text, "next");
    }

    #[test]
    fn test_line_bbox_spans_words() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, 50, 18, 95.0, "a"),
            word_row(1, 1, 2, 70, 18, 60, 22, 90.0, "b"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv, 1.2);
        let bbox = &lines[0].bbox;
        assert_eq!(bbox.left, 10);
        assert_eq!(bbox.top, 18);
        assert_eq!(bbox.width, 120); // 70 + 60 - 10
        assert_eq!(bbox.height, 22); // max bottom 40, min top 18
    }

    #[test]
    fn test_wide_gap_becomes_double_space() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, 50, 18, 95.0, "col1"),
            // gap of 100px > 18 * 1.2
            word_row(1, 1, 2, 160, 20, 50, 18, 95.0, "col2"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv, 1.2);
        assert_eq!(lines[0].text, "col1  col2");
    }

    #[test]
    fn test_low_confidence_and_empty_words_dropped() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, 50, 18, -1.0, "junk"),
            word_row(1, 1, 2, 70, 20, 50, 18, 91.0, "  "),
            word_row(1, 2, 1, 10, 60, 50, 18, 91.0, "kept"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv, 1.2);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "kept");
    }

    #[test]
    fn test_non_word_levels_ignored() {
        let tsv = format!(
            "{HEADER}\n4\t1\t1\t1\t1\t0\t10\t20\t500\t30\t-1\t\n{}",
            word_row(1, 1, 1, 10, 20, 50, 18, 95.0, "word")
        );
        let lines = parse_tsv(&tsv, 1.2);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_lines_sorted_by_position() {
        let tsv = [
            HEADER.to_string(),
            word_row(2, 1, 1, 10, 200, 50, 18, 95.0, "bottom"),
            word_row(1, 1, 1, 10, 20, 50, 18, 95.0, "top"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv, 1.2);
        assert_eq!(lines[0].text, "top");
        assert_eq!(lines[1].text, "bottom");
    }

    #[test]
    fn test_mean_confidence() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 10, 20, 50, 18, 80.0, "a"),
            word_row(1, 1, 2, 70, 20, 50, 18, 90.0, "b"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv, 1.2);
        assert!((lines[0].confidence - 85.0).abs() < 0.01);
    }

    #[test]
    fn test_garbage_rows_skipped() {
        let tsv = format!("{HEADER}\nnot\ta\tvalid\trow\n");
        assert!(parse_tsv(&tsv, 1.2).is_empty());
    }
}
