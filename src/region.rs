use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Axis-aligned rectangle in image pixels plus the text flow detected inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub orientation: Orientation,
}

impl Region {
    pub fn new(x: u32, y: u32, w: u32, h: u32, orientation: Orientation) -> Self {
        Self {
            x,
            y,
            w,
            h,
            orientation,
        }
    }

    pub fn horizontal(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self::new(x, y, w, h, Orientation::Horizontal)
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Smallest rectangle covering both; orientation is taken from `self`.
    pub fn union(&self, other: &Region) -> Region {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Region::new(x1, y1, x2 - x1, y2 - y1, self.orientation)
    }

    /// Grows the rectangle by `padding` on every side, clamped to `width` x `height`.
    pub fn padded(&self, padding: u32, width: u32, height: u32) -> Region {
        let x1 = self.x.saturating_sub(padding);
        let y1 = self.y.saturating_sub(padding);
        let x2 = self.right().saturating_add(padding).min(width);
        let y2 = self.bottom().saturating_add(padding).min(height);
        Region::new(
            x1,
            y1,
            x2.saturating_sub(x1),
            y2.saturating_sub(y1),
            self.orientation,
        )
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Region {
        let x1 = self.x.min(width);
        let y1 = self.y.min(height);
        let x2 = self.right().min(width);
        let y2 = self.bottom().min(height);
        Region::new(x1, y1, x2 - x1, y2 - y1, self.orientation)
    }
}

/// A detected region with its source string and, once translated, its target string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub region: Region,
    pub source_text: String,
    pub target_text: Option<String>,
    pub confidence: f32,
}

impl TextBlock {
    pub fn new(region: Region, source_text: impl Into<String>) -> Self {
        Self {
            region,
            source_text: source_text.into(),
            target_text: None,
            confidence: 100.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn set_translation(&mut self, text: impl Into<String>) {
        self.target_text = Some(text.into());
    }

    pub fn is_translated(&self) -> bool {
        self.target_text
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_rects() {
        let a = Region::horizontal(10, 20, 30, 40);
        let b = Region::new(35, 5, 20, 10, Orientation::Vertical);
        let u = a.union(&b);
        assert_eq!(u, Region::horizontal(10, 5, 45, 55));
    }

    #[test]
    fn padded_is_clamped_to_image() {
        let region = Region::horizontal(4, 4, 10, 10);
        let padded = region.padded(10, 20, 100);
        assert_eq!((padded.x, padded.y, padded.w, padded.h), (0, 0, 20, 24));
    }

    #[test]
    fn clamp_to_trims_outside_area() {
        let region = Region::horizontal(90, 90, 30, 30);
        let clamped = region.clamp_to(100, 100);
        assert_eq!((clamped.w, clamped.h), (10, 10));
        assert!(Region::horizontal(120, 0, 5, 5).clamp_to(100, 100).is_empty());
    }

    #[test]
    fn translation_is_recorded_once_set() {
        let mut block = TextBlock::new(Region::horizontal(0, 0, 1, 1), "こんにちは");
        assert!(!block.is_translated());
        block.set_translation("Hello");
        assert!(block.is_translated());
        assert_eq!(block.target_text.as_deref(), Some("Hello"));
    }
}
