use super::metrics::TextMetrics;

/// Axis a wrapped line is measured along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Measure {
    Row,
    Column,
}

impl Measure {
    fn extent<M: TextMetrics>(self, metrics: &M, text: &str, font_size: f32) -> f32 {
        match self {
            Measure::Row => metrics.text_width(text, font_size),
            Measure::Column => metrics.column_height(text, font_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WrappedLine {
    pub(crate) text: String,
    pub(crate) extent: f32,
}

/// Greedy word wrap: a word joins the current line while the joined line still
/// fits `max_extent`, otherwise it opens a new line. Words are never split, so a
/// word longer than `max_extent` ends up alone on its line.
pub(crate) fn wrap_words<M: TextMetrics>(
    text: &str,
    max_extent: f32,
    font_size: f32,
    metrics: &M,
    measure: Measure,
) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_extent = 0.0;

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            current_extent = measure.extent(metrics, &current, font_size);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        let candidate_extent = measure.extent(metrics, &candidate, font_size);
        if candidate_extent <= max_extent {
            current = candidate;
            current_extent = candidate_extent;
        } else {
            lines.push(WrappedLine {
                text: std::mem::take(&mut current),
                extent: current_extent,
            });
            current.push_str(word);
            current_extent = measure.extent(metrics, &current, font_size);
        }
    }

    if !current.is_empty() {
        lines.push(WrappedLine {
            text: current,
            extent: current_extent,
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::metrics::FixedWidthMetrics;

    fn texts(lines: &[WrappedLine]) -> Vec<&str> {
        lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn wraps_at_width_boundary() {
        let metrics = FixedWidthMetrics::new(1.0);
        let lines = wrap_words("aa bb cc dd", 5.0, 1.0, &metrics, Measure::Row);
        assert_eq!(texts(&lines), vec!["aa bb", "cc dd"]);
        assert_eq!(lines[0].extent, 5.0);
    }

    #[test]
    fn long_word_sits_alone() {
        let metrics = FixedWidthMetrics::new(1.0);
        let lines = wrap_words("a supercalifragilistic b", 6.0, 1.0, &metrics, Measure::Row);
        assert_eq!(texts(&lines), vec!["a", "supercalifragilistic", "b"]);
        assert!(lines[1].extent > 6.0);
    }

    #[test]
    fn collapses_repeated_whitespace() {
        let metrics = FixedWidthMetrics::new(1.0);
        let lines = wrap_words("  one \n two\t", 100.0, 1.0, &metrics, Measure::Row);
        assert_eq!(texts(&lines), vec!["one two"]);
    }

    #[test]
    fn column_measure_uses_glyph_count() {
        let metrics = FixedWidthMetrics::new(0.1);
        let lines = wrap_words("ありがとう ございます", 60.0, 10.0, &metrics, Measure::Column);
        assert_eq!(texts(&lines), vec!["ありがとう", "ございます"]);
        assert_eq!(lines[0].extent, 50.0);
    }
}
