use crate::region::TextBlock;
use crate::text::join_inline;

pub const DEFAULT_GROUP_THRESHOLD: u32 = 50;

/// Groups blocks that sit vertically close to each other (one speech bubble
/// split over several detected lines) into a single translation unit.
///
/// Blocks are ordered by `(y, x)`; a block joins the current group when its top
/// is between 0 and `y_threshold` pixels below the previous block's bottom.
pub fn group_blocks(blocks: &[TextBlock], y_threshold: u32) -> Vec<Vec<TextBlock>> {
    let mut sorted = blocks.to_vec();
    sorted.sort_by_key(|block| (block.region.y, block.region.x));

    let mut groups: Vec<Vec<TextBlock>> = Vec::new();
    let mut current: Vec<TextBlock> = Vec::new();
    for block in sorted {
        if let Some(prev) = current.last() {
            let adjacent = block.region.y >= prev.region.bottom()
                && block.region.y - prev.region.bottom() <= y_threshold;
            if !adjacent {
                groups.push(std::mem::take(&mut current));
            }
        }
        current.push(block);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Collapses a group into one block covering all members, with their text joined
/// in reading order. Members without text are skipped; `None` for an empty group.
pub fn merge_group(group: &[TextBlock]) -> Option<TextBlock> {
    let first = group.first()?;
    let region = group
        .iter()
        .skip(1)
        .fold(first.region, |acc, block| acc.union(&block.region));

    let mut text = String::new();
    let mut conf_sum = 0.0;
    let mut counted = 0usize;
    for block in group {
        let piece = block.source_text.trim();
        if piece.is_empty() {
            continue;
        }
        text = if text.is_empty() {
            piece.to_string()
        } else {
            join_inline(&text, piece)
        };
        conf_sum += block.confidence;
        counted += 1;
    }
    let confidence = if counted > 0 {
        conf_sum / counted as f32
    } else {
        0.0
    };
    Some(TextBlock::new(region, text).with_confidence(confidence))
}
