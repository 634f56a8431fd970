use crate::layout::is_cjk;
use crate::region::{Orientation, Region, TextBlock};
use crate::text::join_inline;

use super::geom::{horizontal_overlap_ratio, iou, vertical_overlap_ratio};

/// Folds lines from another OCR pass into `base`. A matching line (IoU above
/// 0.6) is replaced when the new reading is clearly more confident, or longer
/// without losing CJK content, or when the old reading is a 1-2 char fragment.
pub(super) fn merge_lines(mut base: Vec<TextBlock>, extra: Vec<TextBlock>) -> Vec<TextBlock> {
    for candidate in extra {
        let matching = base
            .iter_mut()
            .find(|existing| iou(&existing.region, &candidate.region) > 0.6);
        match matching {
            Some(existing) if reads_better(&candidate, existing) => *existing = candidate,
            Some(_) => {}
            None => base.push(candidate),
        }
    }
    base
}

fn reads_better(candidate: &TextBlock, existing: &TextBlock) -> bool {
    let new_len = candidate.source_text.chars().count();
    let old_len = existing.source_text.chars().count();
    let keeps_cjk =
        cjk_ratio(&candidate.source_text) + 0.05 >= cjk_ratio(&existing.source_text);
    candidate.confidence > existing.confidence + 5.0
        || (new_len > old_len && keeps_cjk)
        || (old_len <= 2 && new_len >= 4)
}

pub(super) fn scale_lines(lines: Vec<TextBlock>, scale: u32) -> Vec<TextBlock> {
    if scale <= 1 {
        return lines;
    }
    let scale = scale as f32;
    let down = |value: u32| ((value as f32) / scale).round() as u32;
    lines
        .into_iter()
        .map(|mut line| {
            let r = line.region;
            line.region = Region::new(down(r.x), down(r.y), down(r.w), down(r.h), r.orientation);
            line
        })
        .collect()
}

pub(super) fn filter_lines(
    lines: Vec<TextBlock>,
    width: u32,
    height: u32,
    min_confidence: f32,
) -> Vec<TextBlock> {
    lines
        .into_iter()
        .map(|mut line| {
            line.region = line.region.clamp_to(width, height);
            line
        })
        .filter(|line| is_line_valid(line, height, min_confidence))
        .collect()
}

fn is_line_valid(line: &TextBlock, height: u32, min_confidence: f32) -> bool {
    let text = line.source_text.trim();
    let region = line.region;
    // Page-height slivers are panel borders, not text.
    let sliver = region.h as f32 > height as f32 * 0.5 && region.w < 4;
    !text.is_empty()
        && !region.is_empty()
        && !sliver
        && line.confidence >= min_confidence
        && CharMix::of(text).is_plausible()
}

/// Counts letters (including CJK) against punctuation and other symbols.
#[derive(Debug, Default, Clone, Copy)]
struct CharMix {
    letters: usize,
    symbols: usize,
}

impl CharMix {
    fn of(text: &str) -> Self {
        text.chars()
            .filter(|ch| !ch.is_whitespace())
            .fold(Self::default(), |mut mix, ch| {
                if ch.is_alphanumeric() || is_cjk(ch) {
                    mix.letters += 1;
                } else {
                    mix.symbols += 1;
                }
                mix
            })
    }

    // OCR noise on screentone comes out as runs of punctuation.
    fn is_plausible(&self) -> bool {
        let total = self.letters + self.symbols;
        if total == 0 {
            return false;
        }
        let letters = self.letters as f32 / total as f32;
        let symbols = self.symbols as f32 / total as f32;
        !(total > 4 && letters < 0.35) && !(total > 3 && symbols > 0.6)
    }
}

pub(super) fn merge_inline_lines(mut lines: Vec<TextBlock>) -> Vec<TextBlock> {
    lines.sort_by_key(|line| (line.region.y, line.region.x));
    let mut merged: Vec<TextBlock> = Vec::new();

    for line in lines {
        if let Some(last) = merged.last_mut() {
            let same_line = vertical_overlap_ratio(&last.region, &line.region) > 0.6;
            let gap = line.region.x.saturating_sub(last.region.right());
            if same_line && gap as f32 <= (last.region.h as f32 * 0.8).max(6.0) {
                let last_len = last.source_text.chars().count();
                let line_len = line.source_text.chars().count();
                last.confidence = merge_conf(last.confidence, last_len, line.confidence, line_len);
                last.source_text = join_inline(&last.source_text, &line.source_text);
                last.region = last.region.union(&line.region);
                continue;
            }
        }
        merged.push(line);
    }

    merged
}

pub(super) fn suppress_overlaps(lines: Vec<TextBlock>) -> Vec<TextBlock> {
    let mut sorted = lines;
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<TextBlock> = Vec::new();

    'outer: for line in sorted {
        for existing in &kept {
            if iou(&existing.region, &line.region) > 0.5 {
                continue 'outer;
            }
            if vertical_overlap_ratio(&existing.region, &line.region) > 0.8
                && horizontal_overlap_ratio(&existing.region, &line.region) > 0.8
            {
                continue 'outer;
            }
        }
        kept.push(line);
    }
    kept.sort_by_key(|line| (line.region.y, line.region.x));
    kept
}

/// Tall CJK boxes are vertical text; everything else reads horizontally.
pub(super) fn assign_orientation(mut lines: Vec<TextBlock>) -> Vec<TextBlock> {
    for line in &mut lines {
        let tall = line.region.h as f32 >= line.region.w as f32 * 1.5;
        line.region.orientation = if tall && cjk_ratio(&line.source_text) > 0.5 {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        };
    }
    lines
}

fn merge_conf(a: f32, a_len: usize, b: f32, b_len: usize) -> f32 {
    let total = (a_len + b_len).max(1) as f32;
    (a * a_len as f32 + b * b_len as f32) / total
}

fn cjk_ratio(text: &str) -> f32 {
    let (cjk, total) = text
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .fold((0usize, 0usize), |(cjk, total), ch| {
            (cjk + usize::from(is_cjk(ch)), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        cjk as f32 / total as f32
    }
}
