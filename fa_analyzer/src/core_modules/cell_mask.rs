// THEORY:
// A `CellMask` is the whole-cell counterpart of a `LabeledObject`. It summarizes the
// binary cell region once, so that every object in the image can be related to it
// cheaply.
//
// Key principles:
// 1.  **Precomputed Distance Map**: instead of searching the boundary contour for
//     every object, the Euclidean distance transform of the mask is computed once.
//     Each mask pixel holds its distance to the nearest background pixel, so a
//     nearest-boundary query is a single lookup.
// 2.  **Undefined, Not Broken**: an empty mask has no centroid and a mask without
//     any background has no boundary inside the image. Both are represented as
//     `None`/NaN and never cause a panic.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

/// The binary cell region together with its derived geometry.
#[derive(Debug, Clone)]
pub struct CellMask {
    width: u32,
    height: u32,
    /// Number of foreground pixels.
    pub area_px: u64,
    /// Mean position of the foreground pixels, `None` for an empty mask.
    pub centroid: Option<(f64, f64)>,
    /// Row-major distance of every pixel to the nearest background pixel.
    /// Background pixels hold 0.0.
    distance_map: Vec<f64>,
    /// Largest value of the distance map; the "deepest" point of the cell.
    pub max_distance: f64,
}

impl CellMask {
    /// Builds the mask geometry from a binary image where any non-zero pixel is foreground.
    pub fn from_binary(mask: &GrayImage) -> Self {
        let (width, height) = mask.dimensions();

        // --- 1. Area & Centroid ---
        let mut area_px = 0u64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel.0[0] > 0 {
                area_px += 1;
                sum_x += x as f64;
                sum_y += y as f64;
            }
        }
        let centroid = (area_px > 0).then(|| (sum_x / area_px as f64, sum_y / area_px as f64));

        // --- 2. Distance Map ---
        let total = width as usize * height as usize;
        let distance_map = if area_px as usize == total && total > 0 {
            // No background pixel inside the image: the boundary is undefined.
            vec![f64::NAN; total]
        } else {
            // The transform measures distance to the nearest non-zero pixel, so the
            // background is passed in as the non-zero set.
            let background = GrayImage::from_fn(width, height, |x, y| {
                if mask.get_pixel(x, y).0[0] > 0 { Luma([0]) } else { Luma([255]) }
            });
            euclidean_squared_distance_transform(&background)
                .into_raw()
                .into_iter()
                .map(f64::sqrt)
                .collect()
        };

        let max_distance = if distance_map.iter().any(|d| d.is_nan()) {
            f64::NAN
        } else {
            distance_map.iter().copied().fold(0.0, f64::max)
        };

        Self {
            width,
            height,
            area_px,
            centroid,
            distance_map,
            max_distance,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Distance from the pixel nearest to `(x, y)` to the mask boundary.
    ///
    /// Points outside the mask (or outside the image) report 0.0; a non-finite
    /// query point reports NaN.
    pub fn distance_at(&self, x: f64, y: f64) -> f64 {
        if !x.is_finite() || !y.is_finite() {
            return f64::NAN;
        }
        let col = x.round();
        let row = y.round();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return 0.0;
        }
        self.distance_map[row as usize * self.width as usize + col as usize]
    }
}
