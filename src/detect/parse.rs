use anyhow::Result;
use std::collections::BTreeMap;

use crate::region::{Region, TextBlock};
use crate::text::needs_space;

/// TSV level for word rows (page=1, block=2, paragraph=3, line=4, word=5).
const WORD_LEVEL: u8 = 5;

/// Page, block, paragraph and line numbers identifying one OCR line.
type LineKey = (u32, u32, u32, u32);

#[derive(Clone)]
struct WordToken {
    text: String,
    region: Region,
    conf: f32,
    len: usize,
}

/// One word row of tesseract TSV, or `None` for headers, structural rows and
/// rows without recognized text.
fn parse_word_row(row: &str) -> Option<(LineKey, WordToken)> {
    let cols: Vec<&str> = row.split('\t').collect();
    let &[level, page, block, par, line, _word, left, top, width, height, conf, text, ..] =
        cols.as_slice()
    else {
        return None;
    };
    if level.parse::<u8>().ok()? != WORD_LEVEL {
        return None;
    }
    let conf = conf.parse::<f32>().ok().filter(|conf| *conf >= 0.0)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let num = |value: &str| value.parse::<u32>().unwrap_or(0);
    let key = (num(page), num(block), num(par), num(line));
    let region = Region::horizontal(num(left), num(top), num(width), num(height));
    Some((
        key,
        WordToken {
            text: text.to_string(),
            region,
            conf,
            len: text.chars().count().max(1),
        },
    ))
}

/// Parses `tesseract ... tsv` output into one block per detected line, in
/// page/block/paragraph/line order.
pub(super) fn parse_tsv_lines(tsv: &str) -> Result<Vec<TextBlock>> {
    let mut by_line: BTreeMap<LineKey, Vec<WordToken>> = BTreeMap::new();
    for (key, word) in tsv.lines().filter_map(parse_word_row) {
        by_line.entry(key).or_default().push(word);
    }

    Ok(by_line
        .into_values()
        .flat_map(|mut words| {
            words.sort_by_key(|word| word.region.x);
            split_word_segments(words)
        })
        .filter_map(|segment| build_line(&segment))
        .collect())
}

/// Splits one tesseract line at wide horizontal gaps or vertical jumps; PSM 11
/// happily puts two neighbouring bubbles on the same line.
fn split_word_segments(words: Vec<WordToken>) -> Vec<Vec<WordToken>> {
    let mut heights: Vec<u32> = words.iter().map(|word| word.region.h).collect();
    heights.sort_unstable();
    let Some(median) = heights.get(heights.len() / 2) else {
        return Vec::new();
    };
    let median = (*median).max(1) as f32;
    let max_gap = (median * 2.5).clamp(12.0, 120.0);
    let max_drift = (median * 0.9).clamp(6.0, 80.0);

    let mut segments: Vec<Vec<WordToken>> = Vec::new();
    // Right edge and running vertical centre of the open segment.
    let mut edge = (0u32, 0f32);
    for word in words {
        let mid = word.region.y as f32 + word.region.h as f32 * 0.5;
        let starts_new = match segments.last() {
            None => true,
            Some(_) => {
                let gap = word.region.x.saturating_sub(edge.0) as f32;
                gap > max_gap || (mid - edge.1).abs() > max_drift
            }
        };
        if starts_new {
            edge = (word.region.right(), mid);
            segments.push(vec![word]);
        } else if let Some(open) = segments.last_mut() {
            edge = (edge.0.max(word.region.right()), (edge.1 + mid) * 0.5);
            open.push(word);
        }
    }
    segments
}

/// Joins a segment's words and weights confidence by word length.
fn build_line(words: &[WordToken]) -> Option<TextBlock> {
    let (first, rest) = words.split_first()?;
    let text = rest.iter().fold(first.text.clone(), |mut acc, word| {
        if needs_space(&acc, &word.text) {
            acc.push(' ');
        }
        acc.push_str(&word.text);
        acc
    });
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let region = rest
        .iter()
        .fold(first.region, |acc, word| acc.union(&word.region));
    let weight: usize = words.iter().map(|word| word.len).sum();
    let weighted: f32 = words.iter().map(|word| word.conf * word.len as f32).sum();
    let confidence = if weight > 0 { weighted / weight as f32 } else { 0.0 };

    Some(TextBlock::new(region, text).with_confidence(confidence))
}
