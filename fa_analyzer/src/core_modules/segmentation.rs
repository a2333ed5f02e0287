// THEORY:
// Segmentation turns an intensity image and a cell mask into a label raster. The
// rest of the analysis only ever sees the label raster, so the segmentation step is
// a collaborator behind the `Segmenter` trait: any method that produces one label
// per focal adhesion can be plugged in.
//
// The default `ThresholdSegmenter` is a classic bright-spot pipeline:
// 1.  **Smoothing**: a small Gaussian blur suppresses single-pixel noise.
// 2.  **Global Threshold**: Otsu's level splits bright adhesions from the cytoplasm.
// 3.  **Mask Restriction**: only foreground pixels inside the cell are kept.
// 4.  **Area Opening**: connected components smaller than `min_object_px` are dropped.
// 5.  **Labeling**: surviving components get consecutive ids in raster order.

use crate::core_modules::raster::LabelImage;
use crate::error::{AnalysisError, Result};
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashMap;

/// Produces a label raster (0 = background, 1..=N = objects) from an intensity
/// image and a binary cell mask of the same dimensions.
pub trait Segmenter {
    fn segment(&self, intensity: &GrayImage, mask: &GrayImage) -> Result<LabelImage>;
}

#[derive(Debug, Clone)]
pub struct ThresholdSegmenter {
    pub blur_sigma: f32,
    pub min_object_px: usize,
    pub connectivity: Connectivity,
}

impl Default for ThresholdSegmenter {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            min_object_px: 10,
            connectivity: Connectivity::Four,
        }
    }
}

impl Segmenter for ThresholdSegmenter {
    fn segment(&self, intensity: &GrayImage, mask: &GrayImage) -> Result<LabelImage> {
        if !(self.blur_sigma > 0.0) {
            return Err(AnalysisError::invalid_config(format!(
                "blur sigma must be positive, got {}",
                self.blur_sigma
            )));
        }

        // --- 1. Smoothing & Threshold ---
        let blurred = gaussian_blur_f32(intensity, self.blur_sigma);
        let level = otsu_level(&blurred);

        // --- 2. Mask Restriction ---
        let foreground = GrayImage::from_fn(intensity.width(), intensity.height(), |x, y| {
            let bright = blurred.get_pixel(x, y).0[0] > level;
            let inside = mask.get_pixel(x, y).0[0] > 0;
            if bright && inside { Luma([255]) } else { Luma([0]) }
        });

        // --- 3. Labeling & Area Opening ---
        let components = connected_components(&foreground, self.connectivity, Luma([0u8]));
        Ok(relabel_by_size(&components, self.min_object_px))
    }
}

/// Drops components smaller than `min_px` and renumbers the rest as 1..=N in the
/// order their first pixel appears in a raster scan. Input ids may be sparse.
pub fn relabel_by_size(components: &LabelImage, min_px: usize) -> LabelImage {
    let mut sizes: HashMap<u32, usize> = HashMap::new();
    for pixel in components.pixels() {
        let label = pixel.0[0];
        if label != 0 {
            *sizes.entry(label).or_default() += 1;
        }
    }

    let mut remap: HashMap<u32, u32> = HashMap::with_capacity(sizes.len());
    let mut relabeled = LabelImage::new(components.width(), components.height());
    for (x, y, pixel) in components.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 || sizes.get(&label).copied().unwrap_or(0) < min_px {
            continue;
        }
        let next_id = remap.len() as u32 + 1;
        let id = *remap.entry(label).or_insert(next_id);
        relabeled.put_pixel(x, y, Luma([id]));
    }
    relabeled
}

/// Uses a label raster produced elsewhere, e.g. by an external segmentation tool.
/// Labels outside the mask are cleared and the rest renumbered.
#[derive(Debug, Clone)]
pub struct PrecomputedLabels {
    pub labels: LabelImage,
}

impl Segmenter for PrecomputedLabels {
    fn segment(&self, intensity: &GrayImage, mask: &GrayImage) -> Result<LabelImage> {
        if self.labels.dimensions() != intensity.dimensions() {
            let (mask_width, mask_height) = self.labels.dimensions();
            return Err(AnalysisError::DimensionMismatch {
                image_width: intensity.width(),
                image_height: intensity.height(),
                mask_width,
                mask_height,
            });
        }
        let restricted = LabelImage::from_fn(intensity.width(), intensity.height(), |x, y| {
            if mask.get_pixel(x, y).0[0] > 0 { *self.labels.get_pixel(x, y) } else { Luma([0]) }
        });
        Ok(relabel_by_size(&restricted, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::raster::max_label;

    fn spots_image() -> GrayImage {
        let mut image = GrayImage::from_pixel(40, 40, Luma([20]));
        // Two 8x8 bright spots and one single bright pixel.
        for y in 5..13 {
            for x in 5..13 {
                image.put_pixel(x, y, Luma([220]));
                image.put_pixel(x + 20, y + 20, Luma([220]));
            }
        }
        image.put_pixel(30, 5, Luma([255]));
        image
    }

    #[test]
    fn bright_spots_become_labels() {
        let image = spots_image();
        let mask = GrayImage::from_pixel(40, 40, Luma([255]));
        let segmenter = ThresholdSegmenter {
            min_object_px: 5,
            ..ThresholdSegmenter::default()
        };
        let labels = segmenter.segment(&image, &mask).unwrap();
        assert_eq!(max_label(&labels), 2);
        // Raster order: the upper-left spot is first.
        assert_eq!(labels.get_pixel(6, 6).0[0], 1);
        assert_eq!(labels.get_pixel(26, 26).0[0], 2);
        assert_eq!(labels.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn objects_outside_the_mask_are_ignored() {
        let image = spots_image();
        let mask = GrayImage::from_fn(40, 40, |x, _| Luma([if x < 15 { 255 } else { 0 }]));
        let segmenter = ThresholdSegmenter {
            min_object_px: 5,
            ..ThresholdSegmenter::default()
        };
        let labels = segmenter.segment(&image, &mask).unwrap();
        assert_eq!(max_label(&labels), 1);
        assert_eq!(labels.get_pixel(26, 26).0[0], 0);
    }

    #[test]
    fn non_positive_sigma_is_rejected() {
        let segmenter = ThresholdSegmenter {
            blur_sigma: 0.0,
            ..ThresholdSegmenter::default()
        };
        let image = GrayImage::new(4, 4);
        assert!(matches!(
            segmenter.segment(&image, &image),
            Err(AnalysisError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn relabel_drops_small_components_and_compacts_ids() {
        let mut components = LabelImage::new(6, 2);
        components.put_pixel(0, 0, Luma([7]));
        components.put_pixel(1, 0, Luma([7]));
        components.put_pixel(3, 0, Luma([2]));
        components.put_pixel(5, 1, Luma([9]));
        components.put_pixel(4, 1, Luma([9]));
        let relabeled = relabel_by_size(&components, 2);
        assert_eq!(relabeled.get_pixel(0, 0).0[0], 1);
        assert_eq!(relabeled.get_pixel(3, 0).0[0], 0);
        assert_eq!(relabeled.get_pixel(4, 1).0[0], 2);
        assert_eq!(max_label(&relabeled), 2);
    }

    #[test]
    fn precomputed_sparse_ids_are_compacted() {
        let mut labels = LabelImage::new(4, 2);
        labels.put_pixel(0, 0, Luma([u32::MAX]));
        labels.put_pixel(2, 1, Luma([1 << 31]));
        let mask = GrayImage::from_pixel(4, 2, Luma([255]));
        let segmenter = PrecomputedLabels { labels };
        let result = segmenter.segment(&GrayImage::new(4, 2), &mask).unwrap();
        assert_eq!(result.get_pixel(0, 0).0[0], 1);
        assert_eq!(result.get_pixel(2, 1).0[0], 2);
        assert_eq!(max_label(&result), 2);
    }

    #[test]
    fn precomputed_labels_are_restricted_to_the_mask() {
        let mut labels = LabelImage::new(4, 1);
        labels.put_pixel(0, 0, Luma([5]));
        labels.put_pixel(3, 0, Luma([6]));
        let mask = GrayImage::from_raw(4, 1, vec![0, 0, 255, 255]).unwrap();
        let segmenter = PrecomputedLabels { labels };
        let result = segmenter.segment(&GrayImage::new(4, 1), &mask).unwrap();
        assert_eq!(result.into_raw(), vec![0, 0, 0, 1]);
    }
}
