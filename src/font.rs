use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::layout::TextMetrics;

/// Glyph-advance metrics read from a TrueType/OpenType face.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    advances: Arc<HashMap<char, u16>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .field("glyphs", &self.advances.len())
            .finish()
    }
}

impl FontMetrics {
    /// Reads the first face of a font file or collection.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        Self::from_bytes(Arc::new(data), 0)
            .with_context(|| format!("failed to parse font: {}", path.display()))
    }

    fn from_bytes(data: Arc<Vec<u8>>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("face {} is unreadable ({})", face_index, err))?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let (ascender, descender) = (face.ascender(), face.descender());
        let family = family_name(&face);
        let advances = Arc::new(glyph_advances(&face));
        Ok(Self {
            data,
            advances,
            units_per_em,
            space_advance,
            ascender,
            descender,
            family,
            face_index,
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    /// Raw font file bytes, for registering the face with the renderer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn advance_units(&self, text: &str) -> u32 {
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| match ch {
                ' ' => self.space_advance,
                _ => self.advances.get(&ch).copied().unwrap_or(self.space_advance),
            })
            .map(u32::from)
            .fold(0u32, u32::saturating_add)
    }

    fn units_to_px(&self, units: f32, font_size: f32) -> f32 {
        units * font_size / f32::from(self.units_per_em)
    }
}

impl TextMetrics for FontMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        self.units_to_px(self.advance_units(text) as f32, font_size)
    }

    fn line_height(&self, font_size: f32) -> f32 {
        let units = i32::from(self.ascender) - i32::from(self.descender);
        if units > 0 {
            self.units_to_px(units as f32, font_size)
        } else {
            font_size
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Picks the typesetting font. A font file wins; otherwise `font_family` is
/// looked up among system fonts, and without one the first installed
/// `fallback` family is used.
pub fn resolve_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = FontMetrics::from_file(path)?;
        let family = metrics
            .family()
            .or(font_family)
            .unwrap_or("sans-serif")
            .to_string();
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    match font_family {
        Some(family) => lookup_system_family(&db, family),
        None => fallback
            .iter()
            .find_map(|family| lookup_system_family(&db, family).ok())
            .ok_or_else(|| {
                anyhow!(
                    "none of the lettering fonts are installed ({})",
                    fallback.join(", ")
                )
            }),
    }
}

#[cfg(target_os = "macos")]
pub fn fallback_families() -> &'static [&'static str] {
    &["Wild Words", "Anime Ace 2.0 BB", "Hiragino Sans", "sans-serif"]
}

#[cfg(target_os = "windows")]
pub fn fallback_families() -> &'static [&'static str] {
    &["Wild Words", "Anime Ace 2.0 BB", "Comic Sans MS", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn fallback_families() -> &'static [&'static str] {
    &["Wild Words", "Anime Ace 2.0 BB", "Noto Sans CJK JP", "sans-serif"]
}

fn lookup_system_family(db: &fontdb::Database, family: &str) -> Result<ResolvedFont> {
    let families = [if family.eq_ignore_ascii_case("sans-serif") {
        fontdb::Family::SansSerif
    } else {
        fontdb::Family::Name(family)
    }];
    let id = db
        .query(&fontdb::Query {
            families: &families,
            ..Default::default()
        })
        .ok_or_else(|| anyhow!("font family not installed: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = FontMetrics::from_bytes(Arc::new(data), face_index)
        .with_context(|| format!("failed to parse system font: {}", family))?;
    let family = metrics.family().unwrap_or(family).to_string();
    Ok(ResolvedFont { metrics, family })
}

// Horizontal advances for every character the unicode cmap subtables map.
fn glyph_advances(face: &Face<'_>) -> HashMap<char, u16> {
    let mut advances = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return advances;
    };
    for subtable in cmap.subtables.into_iter().filter(|table| table.is_unicode()) {
        subtable.codepoints(|codepoint| {
            let Some(ch) = char::from_u32(codepoint) else {
                return;
            };
            if advances.contains_key(&ch) {
                return;
            }
            if let Some(advance) = subtable
                .glyph_index(codepoint)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
            {
                advances.insert(ch, advance);
            }
        });
    }
    advances
}

// Prefers the typographic family (name ID 16) over the legacy family (ID 1).
fn family_name(face: &Face<'_>) -> Option<String> {
    let lookup = |id: u16| {
        face.names()
            .into_iter()
            .filter(|name| name.name_id == id)
            .find_map(|name| name.to_string())
    };
    lookup(name_id::TYPOGRAPHIC_FAMILY).or_else(|| lookup(name_id::FAMILY))
}
