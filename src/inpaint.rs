use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::region::Region;

pub const DEFAULT_INPAINT_PADDING: u32 = 10;

/// Removes source text pixels from the regions of a page.
pub trait Inpainter: Send + Sync {
    fn inpaint(&self, image: &DynamicImage, regions: &[Region]) -> Result<DynamicImage>;
}

impl<T: Inpainter + ?Sized> Inpainter for std::sync::Arc<T> {
    fn inpaint(&self, image: &DynamicImage, regions: &[Region]) -> Result<DynamicImage> {
        (**self).inpaint(image, regions)
    }
}

impl<T: Inpainter + ?Sized> Inpainter for Box<T> {
    fn inpaint(&self, image: &DynamicImage, regions: &[Region]) -> Result<DynamicImage> {
        (**self).inpaint(image, regions)
    }
}

fn padded_regions(regions: &[Region], padding: u32, width: u32, height: u32) -> Vec<Region> {
    regions
        .iter()
        .map(|region| region.padded(padding, width, height))
        .filter(|region| !region.is_empty())
        .collect()
}

/// Paints each padded region with the most common colour found on its border.
/// Good enough for plain speech bubbles; use [`CommandInpainter`] for artwork.
#[derive(Debug, Clone, Copy)]
pub struct FillInpainter {
    padding: u32,
}

impl FillInpainter {
    pub fn new(padding: u32) -> Self {
        Self { padding }
    }
}

impl Default for FillInpainter {
    fn default() -> Self {
        Self::new(DEFAULT_INPAINT_PADDING)
    }
}

impl Inpainter for FillInpainter {
    fn inpaint(&self, image: &DynamicImage, regions: &[Region]) -> Result<DynamicImage> {
        let (width, height) = image.dimensions();
        let source = image.to_rgba8();
        let mut output = source.clone();
        for region in padded_regions(regions, self.padding, width, height) {
            let fill = dominant_border_color(&source, &region);
            for y in region.y..region.bottom() {
                for x in region.x..region.right() {
                    output.put_pixel(x, y, fill);
                }
            }
        }
        Ok(DynamicImage::ImageRgba8(output))
    }
}

fn dominant_border_color(image: &RgbaImage, region: &Region) -> Rgba<u8> {
    let mut counts: HashMap<[u8; 4], usize> = HashMap::new();
    let right = region.right() - 1;
    let bottom = region.bottom() - 1;
    for x in region.x..region.right() {
        *counts.entry(image.get_pixel(x, region.y).0).or_default() += 1;
        *counts.entry(image.get_pixel(x, bottom).0).or_default() += 1;
    }
    for y in region.y..region.bottom() {
        *counts.entry(image.get_pixel(region.x, y).0).or_default() += 1;
        *counts.entry(image.get_pixel(right, y).0).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(color_a, count_a), (color_b, count_b)| {
            count_a.cmp(count_b).then_with(|| color_a.cmp(color_b))
        })
        .map(|(color, _)| Rgba(color))
        .unwrap_or(Rgba([255, 255, 255, 255]))
}

/// Builds the binary mask handed to external inpainters: white marks pixels to remove.
pub fn build_mask(width: u32, height: u32, regions: &[Region], padding: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for region in padded_regions(regions, padding, width, height) {
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}

/// Runs an external inpainting program (for example `iopaint`).
///
/// Arguments may reference `{image}`, `{mask}`, `{output}`, `{image_dir}`,
/// `{mask_dir}` and `{output_dir}`; the program must write `{output}`.
#[derive(Debug, Clone)]
pub struct CommandInpainter {
    program: String,
    args: Vec<String>,
    padding: u32,
}

impl CommandInpainter {
    pub fn new(program: impl Into<String>, args: Vec<String>, padding: u32) -> Self {
        Self {
            program: program.into(),
            args,
            padding,
        }
    }

    /// Parses a whitespace separated command line; the first word is the program.
    /// A bare `iopaint` expands to the stock lama invocation.
    pub fn from_command_line(command: &str, padding: u32) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("inpaint command is empty"))?;
        let args: Vec<String> = parts.collect();
        if program == "iopaint" && args.is_empty() {
            return Ok(Self::iopaint(padding));
        }
        Ok(Self::new(program, args, padding))
    }

    fn iopaint(padding: u32) -> Self {
        Self::new(
            "iopaint",
            vec![
                "run".to_string(),
                "--model=lama".to_string(),
                "--device=cpu".to_string(),
                "--image={image_dir}".to_string(),
                "--mask={mask_dir}".to_string(),
                "--output={output_dir}".to_string(),
            ],
            padding,
        )
    }

    fn expand_args(&self, dir: &Path) -> Vec<String> {
        let image_dir = dir.join("image");
        let mask_dir = dir.join("mask");
        let output_dir = dir.join("output");
        let replacements = [
            ("{image}", image_dir.join(WORK_FILE)),
            ("{mask}", mask_dir.join(WORK_FILE)),
            ("{output}", output_dir.join(WORK_FILE)),
            ("{image_dir}", image_dir),
            ("{mask_dir}", mask_dir),
            ("{output_dir}", output_dir),
        ];
        self.args
            .iter()
            .map(|arg| {
                replacements
                    .iter()
                    .fold(arg.clone(), |acc, (key, path)| {
                        acc.replace(key, &path.to_string_lossy())
                    })
            })
            .collect()
    }
}

const WORK_FILE: &str = "page.png";

impl Inpainter for CommandInpainter {
    fn inpaint(&self, image: &DynamicImage, regions: &[Region]) -> Result<DynamicImage> {
        let (width, height) = image.dimensions();
        let dir = tempfile::tempdir().with_context(|| "failed to create inpaint work dir")?;
        for sub in ["image", "mask", "output"] {
            std::fs::create_dir_all(dir.path().join(sub))
                .with_context(|| format!("failed to create inpaint {} dir", sub))?;
        }
        let image_path = dir.path().join("image").join(WORK_FILE);
        let mask_path = dir.path().join("mask").join(WORK_FILE);
        let output_path = dir.path().join("output").join(WORK_FILE);

        image
            .save_with_format(&image_path, image::ImageFormat::Png)
            .with_context(|| "failed to write inpaint input image")?;
        build_mask(width, height, regions, self.padding)
            .save_with_format(&mask_path, image::ImageFormat::Png)
            .with_context(|| "failed to write inpaint mask")?;

        let args = self.expand_args(dir.path());
        debug!("running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("failed to run {} (is it installed?)", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} failed: {}", self.program, stderr.trim()));
        }

        let cleaned = image::open(&output_path).with_context(|| {
            format!(
                "{} did not produce {}",
                self.program,
                output_path.display()
            )
        })?;
        if cleaned.dimensions() != (width, height) {
            return Err(anyhow!(
                "{} returned a {}x{} image for a {}x{} page",
                self.program,
                cleaned.width(),
                cleaned.height(),
                width,
                height
            ));
        }
        Ok(cleaned)
    }
}
