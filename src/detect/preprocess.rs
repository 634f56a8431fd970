use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba};

const BINARIZE_THRESHOLD: u8 = 165;
const MAX_OCR_WIDTH: u32 = 6000;
const MAX_UPSCALE: u32 = 3;

/// Largest upscale factor (at most 3) that keeps the page under tesseract's
/// comfortable width.
pub(super) fn ocr_scale(width: u32) -> u32 {
    (1..=MAX_UPSCALE)
        .rev()
        .find(|scale| width.saturating_mul(*scale) <= MAX_OCR_WIDTH)
        .unwrap_or(1)
}

/// Screentone and thin strokes read better when the page is enlarged and
/// stretched. Two variants are produced: binarized first, then plain grayscale.
pub(super) fn preprocess_for_ocr_variants(image: &DynamicImage, scale: u32) -> Vec<DynamicImage> {
    let rgba = image.to_rgba8();
    let gray = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Luma([luma_over_white(*rgba.get_pixel(x, y))])
    });
    let gray = if scale > 1 {
        imageops::resize(
            &gray,
            gray.width().saturating_mul(scale),
            gray.height().saturating_mul(scale),
            FilterType::Lanczos3,
        )
    } else {
        gray
    };

    let stretched = stretch_levels(gray);
    let mut binary = stretched.clone();
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > BINARIZE_THRESHOLD { 255 } else { 0 };
    }
    vec![
        DynamicImage::ImageLuma8(binary),
        DynamicImage::ImageLuma8(stretched),
    ]
}

// Transparent pixels are composited over white before taking BT.601 luma.
fn luma_over_white(Rgba([r, g, b, a]): Rgba<u8>) -> u8 {
    let alpha = f32::from(a) / 255.0;
    let over = |channel: u8| f32::from(channel) * alpha + 255.0 * (1.0 - alpha);
    (0.299 * over(r) + 0.587 * over(g) + 0.114 * over(b))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn stretch_levels(mut image: GrayImage) -> GrayImage {
    let Some(low) = image.pixels().map(|pixel| pixel.0[0]).min() else {
        return image;
    };
    let high = image.pixels().map(|pixel| pixel.0[0]).max().unwrap_or(low);
    if high <= low {
        return image;
    }
    let gain = 255.0 / f32::from(high - low);
    for pixel in image.pixels_mut() {
        pixel.0[0] = (f32::from(pixel.0[0] - low) * gain).round().min(255.0) as u8;
    }
    image
}
