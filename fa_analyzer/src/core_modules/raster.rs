// THEORY:
// The `raster` module is the boundary between files on disk and the in-memory
// pixel grids the rest of the analysis works on. It is intentionally "dumb": it
// loads, binarizes, checks and saves images, but never interprets their content.
//
// Key principles:
// 1.  **One Grid Type Per Role**: intensity and mask images are 8-bit grayscale
//     (`GrayImage`); object labels are 32-bit (`LabelImage`) in memory and 16-bit
//     on disk.
// 2.  **Defensive Masks**: a mask is expected to hold only 0 and 255, but any
//     non-zero value is accepted as foreground rather than rejected. The test runs
//     at the file's own bit depth, before any narrowing.
// 3.  **Range-Preserving Narrowing**: high bit-depth intensity images are stretched
//     from their own min..max onto 0..255, so a 12-bit camera range saved as 16-bit
//     keeps its full histogram for thresholding.
// 4.  **Shared Geometry**: an intensity image and its mask must describe the same
//     pixel grid; this is checked once, up front.

use crate::error::{AnalysisError, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use std::path::Path;

/// Label raster: pixel value is the object id, 0 is background.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

pub const MASK_FOREGROUND: u8 = 255;

fn is_high_depth(image: &DynamicImage) -> bool {
    !matches!(
        image,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_)
    )
}

/// Maps the occupied range `min..=max` linearly onto 0..=255.
/// A constant image maps to 0.
pub fn stretch_to_u8(image: &ImageBuffer<Luma<u16>, Vec<u16>>) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u16::MAX, u16::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if image.is_empty() || max <= min {
        return GrayImage::new(image.width(), image.height());
    }
    let scale = 255.0 / f64::from(max - min);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        Luma([(f64::from(v - min) * scale).round() as u8])
    })
}

/// Opens an intensity image as 8-bit gray. 8-bit sources are converted directly;
/// deeper sources are contrast-stretched over their occupied range.
pub fn load_intensity(path: &Path) -> Result<GrayImage> {
    let image = image::open(path).map_err(|e| AnalysisError::image(path, e))?;
    if is_high_depth(&image) {
        Ok(stretch_to_u8(&image.into_luma16()))
    } else {
        Ok(image.to_luma8())
    }
}

/// Opens a mask and binarizes it at its native depth: any non-zero value is
/// foreground (255).
pub fn load_mask(path: &Path) -> Result<GrayImage> {
    let image = image::open(path).map_err(|e| AnalysisError::image(path, e))?;
    let wide = image.into_luma16();
    Ok(GrayImage::from_fn(wide.width(), wide.height(), |x, y| {
        Luma([if wide.get_pixel(x, y).0[0] > 0 { MASK_FOREGROUND } else { 0 }])
    }))
}

/// Maps every non-zero pixel to 255 and everything else to 0.
pub fn binarize(mask: &GrayImage) -> GrayImage {
    let mut binary = mask.clone();
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > 0 { MASK_FOREGROUND } else { 0 };
    }
    binary
}

pub fn check_dimensions(image: &GrayImage, mask: &GrayImage) -> Result<()> {
    if image.dimensions() != mask.dimensions() {
        return Err(AnalysisError::DimensionMismatch {
            image_width: image.width(),
            image_height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }
    Ok(())
}

pub fn max_label(labels: &LabelImage) -> u32 {
    labels.pixels().map(|p| p.0[0]).max().unwrap_or(0)
}

/// Writes the label raster as a 16-bit grayscale TIFF.
pub fn save_labels(labels: &LabelImage, path: &Path) -> Result<()> {
    let count = max_label(labels) as usize;
    if count > u16::MAX as usize {
        return Err(AnalysisError::TooManyLabels {
            count,
            max: u16::MAX as usize,
        });
    }

    let (width, height) = labels.dimensions();
    let narrowed: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([labels.get_pixel(x, y).0[0] as u16]));

    narrowed
        .save_with_format(path, ImageFormat::Tiff)
        .map_err(|e| AnalysisError::image(path, e))
}
