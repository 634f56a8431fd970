mod metrics;
mod wrap;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::region::{Orientation, Region, TextBlock};
use wrap::{Measure, WrappedLine, wrap_words};

pub use metrics::{EstimatedMetrics, FixedWidthMetrics, TextMetrics};
pub(crate) use metrics::is_cjk;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("text is empty")]
    EmptyText,
    #[error("region {width}x{height} leaves no room for text after {padding}px padding")]
    InvalidRegion {
        width: u32,
        height: u32,
        padding: f32,
    },
    #[error("invalid layout config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub max_font_size: f32,
    pub min_font_size: f32,
    pub line_spacing_factor: f32,
    pub padding: f32,
    pub font_step: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_font_size: 50.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.1,
            padding: 5.0,
            font_step: 1.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let finite = [
            self.max_font_size,
            self.min_font_size,
            self.line_spacing_factor,
            self.padding,
            self.font_step,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !finite {
            return Err(LayoutError::InvalidConfig(
                "values must be finite numbers".to_string(),
            ));
        }
        if self.min_font_size <= 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "min_font_size must be positive (got {})",
                self.min_font_size
            )));
        }
        if self.max_font_size < self.min_font_size {
            return Err(LayoutError::InvalidConfig(format!(
                "max_font_size {} is below min_font_size {}",
                self.max_font_size, self.min_font_size
            )));
        }
        if self.line_spacing_factor <= 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "line_spacing_factor must be positive (got {})",
                self.line_spacing_factor
            )));
        }
        if self.font_step <= 0.0 || self.max_font_size - self.font_step >= self.max_font_size {
            return Err(LayoutError::InvalidConfig(format!(
                "font_step {} is too small to change a {}px font",
                self.font_step, self.max_font_size
            )));
        }
        if self.padding < 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "padding must not be negative (got {})",
                self.padding
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

/// One row (or column) of laid out text. `position` is the top-left corner of
/// the glyph box; `extent` is its measured length along the reading axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutLine {
    pub text: String,
    pub position: Point,
    pub extent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    pub orientation: Orientation,
    pub font_size: f32,
    pub line_advance: f32,
    pub lines: Vec<LayoutLine>,
    /// Top-left corner of the whole text block.
    pub origin: Point,
    pub block: Size,
    /// Set when the block does not fit the padded region even at the final size.
    pub overflow: bool,
}

impl LayoutResult {
    pub fn line_texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().flat_map(|line| line.text.split_whitespace())
    }
}

struct InnerBox {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl InnerBox {
    fn from_region(region: &Region, padding: f32) -> Result<Self, LayoutError> {
        let w = region.w as f32 - 2.0 * padding;
        let h = region.h as f32 - 2.0 * padding;
        if w <= 0.0 || h <= 0.0 {
            return Err(LayoutError::InvalidRegion {
                width: region.w,
                height: region.h,
                padding,
            });
        }
        Ok(Self {
            x: region.x as f32 + padding,
            y: region.y as f32 + padding,
            w,
            h,
        })
    }
}

/// Lays `text` out inside `region`.
///
/// Horizontal regions search font sizes from `max_font_size` downwards in
/// `font_step` decrements and take the first size whose wrapped block fits the
/// padded height; at `min_font_size` the wrapping is accepted even if it does
/// not fit. Vertical regions are always set at `min_font_size`.
pub fn layout_text<M: TextMetrics>(
    text: &str,
    region: &Region,
    config: &LayoutConfig,
    metrics: &M,
) -> Result<LayoutResult, LayoutError> {
    config.validate()?;
    if text.trim().is_empty() {
        return Err(LayoutError::EmptyText);
    }
    let inner = InnerBox::from_region(region, config.padding)?;

    let result = match region.orientation {
        Orientation::Horizontal => layout_rows(text, &inner, config, metrics),
        Orientation::Vertical => layout_columns(text, &inner, config, metrics),
    };
    if result.overflow {
        debug!(
            "text overflows {}x{} region at {}px ({} lines)",
            region.w,
            region.h,
            result.font_size,
            result.lines.len()
        );
    }
    Ok(result)
}

fn layout_rows<M: TextMetrics>(
    text: &str,
    inner: &InnerBox,
    config: &LayoutConfig,
    metrics: &M,
) -> LayoutResult {
    let steps = ((config.max_font_size - config.min_font_size) / config.font_step).ceil() as u32;
    let mut step = 0;
    loop {
        let font_size = (config.max_font_size - step as f32 * config.font_step)
            .max(config.min_font_size);
        let wrapped = wrap_words(text, inner.w, font_size, metrics, Measure::Row);
        let advance = font_size * config.line_spacing_factor;
        let block_h = wrapped.len() as f32 * advance;
        if block_h <= inner.h || step >= steps || font_size <= config.min_font_size {
            return place_rows(wrapped, inner, font_size, advance, metrics);
        }
        step += 1;
    }
}

fn place_rows<M: TextMetrics>(
    wrapped: Vec<WrappedLine>,
    inner: &InnerBox,
    font_size: f32,
    advance: f32,
    metrics: &M,
) -> LayoutResult {
    let block_w = wrapped.iter().map(|line| line.extent).fold(0.0, f32::max);
    let block_h = wrapped.len() as f32 * advance;
    let origin = Point {
        x: inner.x + ((inner.w - block_w) * 0.5).max(0.0),
        y: inner.y + ((inner.h - block_h) * 0.5).max(0.0),
    };
    let leading = ((advance - metrics.line_height(font_size)) * 0.5).max(0.0);

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(idx, line)| LayoutLine {
            position: Point {
                x: inner.x + ((inner.w - line.extent) * 0.5).max(0.0),
                y: origin.y + idx as f32 * advance + leading,
            },
            extent: line.extent,
            text: line.text,
        })
        .collect();

    LayoutResult {
        orientation: Orientation::Horizontal,
        font_size,
        line_advance: advance,
        lines,
        origin,
        block: Size {
            w: block_w,
            h: block_h,
        },
        overflow: block_w > inner.w || block_h > inner.h,
    }
}

fn layout_columns<M: TextMetrics>(
    text: &str,
    inner: &InnerBox,
    config: &LayoutConfig,
    metrics: &M,
) -> LayoutResult {
    // No size search for vertical text; it is always set at the floor size.
    let font_size = config.min_font_size;
    let advance = font_size * config.line_spacing_factor;
    let wrapped = wrap_words(text, inner.h, font_size, metrics, Measure::Column);

    let block_w = wrapped.len() as f32 * advance;
    let block_h = wrapped.iter().map(|line| line.extent).fold(0.0, f32::max);
    let origin = Point {
        x: if block_w <= inner.w {
            inner.x + (inner.w - block_w) * 0.5
        } else {
            inner.x + inner.w - block_w
        },
        y: inner.y + ((inner.h - block_h) * 0.5).max(0.0),
    };
    let gutter = ((advance - font_size) * 0.5).max(0.0);

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(idx, line)| LayoutLine {
            position: Point {
                x: origin.x + block_w - (idx + 1) as f32 * advance + gutter,
                y: inner.y + ((inner.h - line.extent) * 0.5).max(0.0),
            },
            extent: line.extent,
            text: line.text,
        })
        .collect();

    LayoutResult {
        orientation: Orientation::Vertical,
        font_size,
        line_advance: advance,
        lines,
        origin,
        block: Size {
            w: block_w,
            h: block_h,
        },
        overflow: block_w > inner.w || block_h > inner.h,
    }
}

/// Layout configuration bound to a metrics provider, built once per pipeline.
#[derive(Debug, Clone)]
pub struct LayoutEngine<M> {
    config: LayoutConfig,
    metrics: M,
}

impl<M: TextMetrics> LayoutEngine<M> {
    pub fn new(config: LayoutConfig, metrics: M) -> Result<Self, LayoutError> {
        config.validate()?;
        Ok(Self { config, metrics })
    }

    pub fn layout(&self, block: &TextBlock) -> Result<LayoutResult, LayoutError> {
        let text = block.target_text.as_deref().unwrap_or_default();
        layout_text(text, &block.region, &self.config, &self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETING: &str = "Hello there, how are you doing today?";

    fn scenario_config() -> LayoutConfig {
        LayoutConfig {
            max_font_size: 24.0,
            min_font_size: 8.0,
            line_spacing_factor: 1.2,
            padding: 4.0,
            font_step: 1.0,
        }
    }

    fn fits(text: &str, inner_w: f32, inner_h: f32, size: f32, config: &LayoutConfig) -> bool {
        let metrics = FixedWidthMetrics::default();
        let lines = wrap_words(text, inner_w, size, &metrics, Measure::Row);
        lines.len() as f32 * (size * config.line_spacing_factor) <= inner_h
    }

    #[test]
    fn greeting_fits_200x100_box() {
        let config = scenario_config();
        let region = Region::horizontal(0, 0, 200, 100);
        let result = layout_text(GREETING, &region, &config, &FixedWidthMetrics::default())
            .expect("layout");
        assert!(result.font_size <= 24.0);
        assert!(result.font_size >= 8.0);
        assert!(!result.overflow);
        for line in &result.lines {
            assert!(line.extent <= 192.0, "line too wide: {:?}", line);
        }
        assert!(result.block.h <= 92.0);
    }

    #[test]
    fn empty_text_is_rejected() {
        let region = Region::horizontal(0, 0, 200, 100);
        let metrics = FixedWidthMetrics::default();
        assert_eq!(
            layout_text("", &region, &scenario_config(), &metrics),
            Err(LayoutError::EmptyText)
        );
        assert_eq!(
            layout_text(" \n\t", &region, &scenario_config(), &metrics),
            Err(LayoutError::EmptyText)
        );
    }

    #[test]
    fn zero_width_region_is_rejected() {
        let region = Region::horizontal(0, 0, 0, 50);
        let err = layout_text(GREETING, &region, &scenario_config(), &FixedWidthMetrics::default())
            .unwrap_err();
        assert!(matches!(
            err,
            LayoutError::InvalidRegion {
                width: 0,
                height: 50,
                ..
            }
        ));
    }

    #[test]
    fn padding_larger_than_region_is_rejected() {
        let region = Region::horizontal(0, 0, 8, 100);
        let err = layout_text(GREETING, &region, &scenario_config(), &FixedWidthMetrics::default())
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidRegion { .. }));
    }

    #[test]
    fn inverted_font_bounds_are_rejected() {
        let config = LayoutConfig {
            max_font_size: 6.0,
            ..scenario_config()
        };
        let region = Region::horizontal(0, 0, 200, 100);
        let err = layout_text(GREETING, &region, &config, &FixedWidthMetrics::default())
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig(_)));
        assert!(LayoutEngine::new(config, FixedWidthMetrics::default()).is_err());
    }

    #[test]
    fn step_below_font_resolution_is_rejected() {
        let config = LayoutConfig {
            max_font_size: 50.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.1,
            padding: 5.0,
            font_step: 1e-7,
        };
        let region = Region::horizontal(0, 0, 60, 40);
        let err = layout_text(GREETING, &region, &config, &FixedWidthMetrics::default())
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig(_)));
    }

    #[test]
    fn uneven_step_still_reaches_min_size() {
        let config = LayoutConfig {
            font_step: 3.0,
            ..scenario_config()
        };
        let region = Region::horizontal(0, 0, 40, 20);
        let result = layout_text(GREETING, &region, &config, &FixedWidthMetrics::default())
            .expect("layout");
        assert_eq!(result.font_size, config.min_font_size);
        assert!(result.overflow);
    }

    #[test]
    fn picks_largest_fitting_size() {
        let config = scenario_config();
        let metrics = FixedWidthMetrics::default();
        for (w, h) in [(200, 100), (120, 60), (90, 200), (300, 40), (64, 64)] {
            let region = Region::horizontal(0, 0, w, h);
            let inner_w = w as f32 - 8.0;
            let inner_h = h as f32 - 8.0;
            let result = layout_text(GREETING, &region, &config, &metrics).expect("layout");
            assert!(result.font_size >= config.min_font_size);
            assert!(result.font_size <= config.max_font_size);
            if !result.overflow {
                let bigger = result.font_size + config.font_step;
                if bigger <= config.max_font_size {
                    assert!(
                        !fits(GREETING, inner_w, inner_h, bigger, &config),
                        "{}px would also fit {}x{}",
                        bigger,
                        w,
                        h
                    );
                }
            }
        }
    }

    #[test]
    fn falls_back_to_min_size_with_overflow() {
        let config = scenario_config();
        let region = Region::horizontal(0, 0, 40, 20);
        let result = layout_text(GREETING, &region, &config, &FixedWidthMetrics::default())
            .expect("layout");
        assert_eq!(result.font_size, config.min_font_size);
        assert!(result.overflow);
        assert_eq!(result.origin.y, 4.0);
    }

    #[test]
    fn single_long_word_sits_alone() {
        let config = scenario_config();
        let region = Region::horizontal(0, 0, 60, 200);
        let text = "a pneumonoultramicroscopic b";
        let result =
            layout_text(text, &region, &config, &FixedWidthMetrics::default()).expect("layout");
        assert!(result.line_texts().contains(&"pneumonoultramicroscopic"));
        assert_eq!(result.lines.len(), 3);
    }

    #[test]
    fn words_survive_wrapping_in_order() {
        let config = scenario_config();
        let metrics = FixedWidthMetrics::default();
        let samples = [
            GREETING,
            "WAIT!! Don't   go into the   forest alone, it's dangerous at night",
            "one",
            "a b c d e f g h i j k l m n o p q r s t u v w x y z",
        ];
        for text in samples {
            for (w, h) in [(40, 40), (100, 60), (400, 300)] {
                let region = Region::horizontal(10, 10, w, h);
                let result = layout_text(text, &region, &config, &metrics).expect("layout");
                let expected: Vec<&str> = text.split_whitespace().collect();
                let actual: Vec<&str> = result.words().collect();
                assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn layout_is_deterministic() {
        let config = scenario_config();
        let region = Region::horizontal(5, 7, 150, 90);
        let metrics = EstimatedMetrics;
        let first = layout_text(GREETING, &region, &config, &metrics).expect("layout");
        let second = layout_text(GREETING, &region, &config, &metrics).expect("layout");
        assert_eq!(first, second);
    }

    #[test]
    fn rows_are_centered_in_padded_box() {
        let config = LayoutConfig {
            max_font_size: 10.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.0,
            padding: 0.0,
            font_step: 1.0,
        };
        let region = Region::horizontal(100, 50, 100, 40);
        let result =
            layout_text("abcd", &region, &config, &FixedWidthMetrics::default()).expect("layout");
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].position, Point { x: 140.0, y: 65.0 });
        assert_eq!(result.origin, Point { x: 140.0, y: 65.0 });
    }

    #[test]
    fn vertical_always_uses_min_size() {
        let config = scenario_config();
        let metrics = FixedWidthMetrics::default();
        for (w, h) in [(400, 400), (60, 300), (30, 30)] {
            let region = Region::new(0, 0, w, h, Orientation::Vertical);
            let result = layout_text("まって 行かないで", &region, &config, &metrics)
                .expect("layout");
            assert_eq!(result.font_size, config.min_font_size);
            assert_eq!(result.orientation, Orientation::Vertical);
        }
    }

    #[test]
    fn vertical_columns_run_right_to_left() {
        let config = LayoutConfig {
            max_font_size: 20.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.0,
            padding: 0.0,
            font_step: 1.0,
        };
        let region = Region::new(0, 0, 100, 40, Orientation::Vertical);
        let result = layout_text("あいう えおか", &region, &config, &FixedWidthMetrics::default())
            .expect("layout");
        assert_eq!(result.line_texts(), vec!["あいう", "えおか"]);
        assert!(result.lines[0].position.x > result.lines[1].position.x);
        assert_eq!(result.lines[0].position, Point { x: 50.0, y: 5.0 });
        assert_eq!(result.origin, Point { x: 40.0, y: 5.0 });
        assert!(!result.overflow);
    }

    #[test]
    fn wide_row_keeps_left_edge_and_flags_overflow() {
        let config = LayoutConfig {
            max_font_size: 10.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.0,
            padding: 2.0,
            font_step: 1.0,
        };
        let region = Region::horizontal(20, 30, 34, 100);
        let result = layout_text(
            "pneumonoultramicroscopic",
            &region,
            &config,
            &FixedWidthMetrics::default(),
        )
        .expect("layout");
        assert!(result.overflow);
        assert_eq!(result.block.w, 120.0);
        assert_eq!(result.origin.x, 22.0);
        assert_eq!(result.lines[0].position.x, 22.0);
    }

    #[test]
    fn too_many_columns_pin_to_right_edge() {
        let config = LayoutConfig {
            max_font_size: 20.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.0,
            padding: 0.0,
            font_step: 1.0,
        };
        let region = Region::new(0, 0, 25, 40, Orientation::Vertical);
        let result = layout_text(
            "あいう えおか かきく",
            &region,
            &config,
            &FixedWidthMetrics::default(),
        )
        .expect("layout");
        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.block.w, 30.0);
        assert!(result.overflow);
        assert_eq!(result.origin.x, 25.0 - 30.0);
        assert_eq!(result.lines[0].position.x, 15.0);
        assert_eq!(result.lines[2].position.x, -5.0);
    }

    #[test]
    fn tall_column_pins_to_top_and_flags_overflow() {
        let config = LayoutConfig {
            max_font_size: 20.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.0,
            padding: 0.0,
            font_step: 1.0,
        };
        let region = Region::new(0, 0, 100, 20, Orientation::Vertical);
        let result = layout_text("あいうえおか", &region, &config, &FixedWidthMetrics::default())
            .expect("layout");
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.block.h, 60.0);
        assert!(result.overflow);
        assert_eq!(result.origin, Point { x: 45.0, y: 0.0 });
        assert_eq!(result.lines[0].position.y, 0.0);
    }

    #[test]
    fn column_keeps_a_cell_between_words() {
        let config = LayoutConfig {
            max_font_size: 20.0,
            min_font_size: 10.0,
            line_spacing_factor: 1.0,
            padding: 0.0,
            font_step: 1.0,
        };
        let region = Region::new(0, 0, 100, 400, Orientation::Vertical);
        let result = layout_text("How are you", &region, &config, &FixedWidthMetrics::default())
            .expect("layout");
        assert_eq!(result.line_texts(), vec!["How are you"]);
        assert_eq!(result.lines[0].extent, 110.0);
        assert_eq!(result.block.h, 110.0);
    }

    #[test]
    fn engine_lays_out_translated_block() {
        let engine = LayoutEngine::new(scenario_config(), FixedWidthMetrics::default())
            .expect("engine");
        let mut block = TextBlock::new(Region::horizontal(0, 0, 200, 100), "元気？");
        assert_eq!(engine.layout(&block), Err(LayoutError::EmptyText));
        block.set_translation("How are you?");
        let result = engine.layout(&block).expect("layout");
        assert_eq!(result.line_texts(), vec!["How are you?"]);
    }
}
