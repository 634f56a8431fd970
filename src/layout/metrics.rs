/// Font measurement used by the layout engine.
///
/// Implementations must be deterministic: the same text and size always give
/// the same extents, otherwise layout results are not reproducible.
pub trait TextMetrics: Send + Sync {
    /// Horizontal advance of `text` in pixels at `font_size`.
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Height of a single rendered row.
    fn line_height(&self, font_size: f32) -> f32 {
        font_size
    }

    /// Vertical extent of `text` set as one column: one em per glyph and one
    /// empty cell between words.
    fn column_height(&self, text: &str, font_size: f32) -> f32 {
        let (glyphs, words) = text
            .split_whitespace()
            .fold((0usize, 0usize), |(glyphs, words), word| {
                (glyphs + word.chars().count(), words + 1)
            });
        (glyphs + words.saturating_sub(1)) as f32 * font_size
    }
}

impl<M: TextMetrics + ?Sized> TextMetrics for &M {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        (**self).text_width(text, font_size)
    }

    fn line_height(&self, font_size: f32) -> f32 {
        (**self).line_height(font_size)
    }

    fn column_height(&self, text: &str, font_size: f32) -> f32 {
        (**self).column_height(text, font_size)
    }
}

impl<M: TextMetrics + ?Sized> TextMetrics for std::sync::Arc<M> {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        (**self).text_width(text, font_size)
    }

    fn line_height(&self, font_size: f32) -> f32 {
        (**self).line_height(font_size)
    }

    fn column_height(&self, text: &str, font_size: f32) -> f32 {
        (**self).column_height(text, font_size)
    }
}

/// Every character advances by `advance_em * font_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWidthMetrics {
    pub advance_em: f32,
}

impl FixedWidthMetrics {
    pub fn new(advance_em: f32) -> Self {
        Self { advance_em }
    }
}

impl Default for FixedWidthMetrics {
    fn default() -> Self {
        Self { advance_em: 0.5 }
    }
}

impl TextMetrics for FixedWidthMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().filter(|ch| *ch != '\n').count() as f32 * self.advance_em * font_size
    }
}

/// Heuristic widths used when no font file could be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl TextMetrics for EstimatedMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        estimate_text_width_units(text) * font_size
    }
}

pub(crate) fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF
    )
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if is_cjk(ch) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(estimate_char_units)
        .sum()
}
