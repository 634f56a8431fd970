use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::layout::LayoutResult;
use crate::region::{Orientation, Region};

/// Baseline offset from the top of a glyph box, as a fraction of the font size.
const BASELINE_RATIO: f32 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub text_color: String,
    pub outline_color: String,
    pub outline_width: f32,
    pub font_family: Option<String>,
    pub clip_overflow: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            outline_color: "#ffffff".to_string(),
            outline_width: 2.0,
            font_family: None,
            clip_overflow: false,
        }
    }
}

/// A laid out block ready to be drawn into its region.
#[derive(Debug, Clone)]
pub struct Placement {
    pub region: Region,
    pub layout: LayoutResult,
}

/// Draws laid out text onto inpainted pages. Holds the font database so it is
/// loaded once per process rather than once per page.
pub struct Compositor {
    style: RenderStyle,
    fontdb: Arc<fontdb::Database>,
}

impl Compositor {
    pub fn new(style: RenderStyle, font_data: Option<&[u8]>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Some(data) = font_data {
            db.load_font_data(data.to_vec());
        }
        Self::with_database(style, db)
    }

    pub fn with_database(style: RenderStyle, db: fontdb::Database) -> Self {
        Self {
            style,
            fontdb: Arc::new(db),
        }
    }

    pub fn compose(&self, base: &DynamicImage, placements: &[Placement]) -> Result<DynamicImage> {
        let svg = build_svg(base, placements, &self.style)?;
        self.rasterize(&svg)
    }

    fn rasterize(&self, svg: &str) -> Result<DynamicImage> {
        let options = Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Options::default()
        };
        let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
        let size = tree.size().to_int_size();
        let mut pixmap =
            Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
            .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
        Ok(DynamicImage::ImageRgba8(image))
    }
}

pub fn build_svg(base: &DynamicImage, placements: &[Placement], style: &RenderStyle) -> Result<String> {
    let (width, height) = base.dimensions();
    let mut png = Vec::new();
    base.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| "failed to encode base image")?;
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&png));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for (idx, placement) in placements.iter().enumerate() {
        let clip = if style.clip_overflow {
            let Region { x, y, w, h, .. } = placement.region;
            let clip_id = format!("clip-{}", idx);
            svg.push_str(&format!(
                r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath>"#,
                id = clip_id,
            ));
            Some(clip_id)
        } else {
            None
        };
        svg.push_str(&group_open(&placement.layout, style, clip.as_deref()));
        match placement.layout.orientation {
            Orientation::Horizontal => push_rows(&mut svg, &placement.layout),
            Orientation::Vertical => push_columns(&mut svg, &placement.layout),
        }
        svg.push_str("</g>");
    }

    svg.push_str("</svg>");
    Ok(svg)
}

fn group_open(layout: &LayoutResult, style: &RenderStyle, clip: Option<&str>) -> String {
    let mut attrs = format!(
        r#"font-size="{size}" fill="{fill}" stroke="{stroke}" stroke-width="{stroke_w}" stroke-linejoin="round" paint-order="stroke""#,
        size = layout.font_size,
        fill = escape_xml(&style.text_color),
        stroke = escape_xml(&style.outline_color),
        stroke_w = style.outline_width * 2.0,
    );
    if let Some(family) = style.font_family.as_deref() {
        attrs.push_str(&format!(r#" font-family="{}""#, escape_xml(family)));
    }
    if let Some(clip) = clip {
        attrs.push_str(&format!(r#" clip-path="url(#{})""#, clip));
    }
    format!("<g {}>", attrs)
}

fn push_rows(svg: &mut String, layout: &LayoutResult) {
    let baseline = layout.font_size * BASELINE_RATIO;
    for line in &layout.lines {
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}">{text}</text>"#,
            x = line.position.x,
            y = line.position.y + baseline,
            text = escape_xml(&line.text)
        ));
    }
}

fn push_columns(svg: &mut String, layout: &LayoutResult) {
    let size = layout.font_size;
    let baseline = size * BASELINE_RATIO;
    for column in &layout.lines {
        let center_x = column.position.x + size * 0.5;
        let mut row = 0usize;
        for word in column.text.split_whitespace() {
            for ch in word.chars() {
                svg.push_str(&format!(
                    r#"<text x="{x}" y="{y}" text-anchor="middle">{text}</text>"#,
                    x = center_x,
                    y = column.position.y + row as f32 * size + baseline,
                    text = escape_xml(&ch.to_string())
                ));
                row += 1;
            }
            // gap cell
            row += 1;
        }
    }
}

/// Writes `image` to `path`, picking the encoder from the file extension.
pub fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let format = image::ImageFormat::from_path(path)
        .with_context(|| format!("unsupported output image type: {}", path.display()))?;
    let image = match format {
        image::ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image.clone(),
    };
    image
        .save_with_format(path, format)
        .with_context(|| format!("failed to write image: {}", path.display()))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
