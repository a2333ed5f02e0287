// THEORY:
// `region_props` turns a label raster into a list of `LabeledObject`s, the per-object
// measurement records of the analysis. It is the spatial aggregation step: pixels
// that share a label become one object with a size, a position and a shape.
//
// Algorithm:
// 1.  **Moment Accumulation**: a single raster scan accumulates, per label, the pixel
//     count and the raw moments up to second order.
// 2.  **Equivalent Ellipse**: central second moments (plus 1/12 on the diagonal, the
//     variance of a unit pixel) give the ellipse with the same inertia. Its axis
//     ratio is the aspect ratio and its major-axis angle is the orientation.
// 3.  **Crofton Perimeter**: the perimeter is estimated from the number of label
//     transitions along four line families (0, 90, 45 and 135 degrees). Unlike a
//     boundary-pixel count this is nearly isotropic: a digital disc of radius r
//     measures close to 2*pi*r.
// 4.  **Stateless Utility**: `measure_objects` has no memory; it takes one label image
//     and returns one list.

use crate::core_modules::raster::LabelImage;
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

/// Per-object morphometry for a single labeled focal adhesion.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledObject {
    /// Label value in the label raster, starting at 1.
    pub id: u32,
    /// Number of pixels.
    pub area_px: f64,
    /// Crofton perimeter estimate, in pixels.
    pub perimeter_px: f64,
    /// Centroid in pixel coordinates (x right, y down).
    pub centroid: (f64, f64),
    /// Major-axis angle of the equivalent ellipse in degrees, in [-90, 90).
    pub orientation_deg: f64,
    /// Major / minor axis ratio of the equivalent ellipse.
    pub aspect_ratio: f64,
    /// perimeter^2 / area.
    pub shape_factor: f64,
}

/// Shape factor as perimeter squared over area.
pub fn shape_factor(perimeter_px: f64, area_px: f64) -> f64 {
    perimeter_px * perimeter_px / area_px
}

#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: f64,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
}

impl Moments {
    fn add(&mut self, x: f64, y: f64) {
        self.count += 1.0;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }

    fn centroid(&self) -> (f64, f64) {
        (self.sum_x / self.count, self.sum_y / self.count)
    }

    /// Returns (orientation in degrees, major/minor axis ratio).
    fn ellipse(&self) -> (f64, f64) {
        let (cx, cy) = self.centroid();
        let mu20 = self.sum_xx / self.count - cx * cx + 1.0 / 12.0;
        let mu02 = self.sum_yy / self.count - cy * cy + 1.0 / 12.0;
        let mu11 = self.sum_xy / self.count - cx * cy;

        let half_trace = (mu20 + mu02) / 2.0;
        let spread = ((mu20 - mu02) * (mu20 - mu02) / 4.0 + mu11 * mu11).sqrt();
        let lambda_major = half_trace + spread;
        let lambda_minor = (half_trace - spread).max(f64::MIN_POSITIVE);

        let orientation = 0.5 * (2.0 * mu11).atan2(mu20 - mu02);
        (
            normalize_orientation(orientation.to_degrees()),
            (lambda_major / lambda_minor).sqrt(),
        )
    }
}

/// Maps an undirected axis angle into [-90, 90).
pub fn normalize_orientation(deg: f64) -> f64 {
    let folded = (deg + 90.0).rem_euclid(180.0) - 90.0;
    if folded >= 90.0 { folded - 180.0 } else { folded }
}

/// Direction steps for the four Crofton line families, with their line spacing.
const CROFTON_DIRECTIONS: [((i64, i64), f64); 4] = [
    ((1, 0), 1.0),
    ((0, 1), 1.0),
    ((1, 1), std::f64::consts::FRAC_1_SQRT_2),
    ((1, -1), std::f64::consts::FRAC_1_SQRT_2),
];

fn label_at(labels: &LabelImage, x: i64, y: i64) -> u32 {
    let (width, height) = labels.dimensions();
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        0
    } else {
        labels.get_pixel(x as u32, y as u32).0[0]
    }
}

/// Crofton perimeter of every label present in the raster.
fn crofton_perimeters(labels: &LabelImage) -> HashMap<u32, f64> {
    let (width, height) = labels.dimensions();
    let mut perimeters: HashMap<u32, f64> = HashMap::new();

    for ((dx, dy), spacing) in CROFTON_DIRECTIONS {
        // Pairs (p, p + d) with p ranging over the image padded by one pixel, so
        // that objects touching the border are closed by the outside background.
        for y in -1..=height as i64 {
            for x in -1..=width as i64 {
                let here = label_at(labels, x, y);
                let there = label_at(labels, x + dx, y + dy);
                if here != there {
                    if here != 0 {
                        *perimeters.entry(here).or_default() += spacing;
                    }
                    if there != 0 {
                        *perimeters.entry(there).or_default() += spacing;
                    }
                }
            }
        }
    }

    // Four directions, each covering pi/4 of the half circle:
    // P = (1/2) * sum_d (pi/4) * spacing_d * N_d.
    perimeters.values_mut().for_each(|p| *p *= PI / 8.0);
    perimeters
}

/// Measures every label present in the raster, in ascending id order. Ids need not
/// be consecutive.
pub fn measure_objects(labels: &LabelImage) -> Vec<LabeledObject> {
    // --- 1. Moment Accumulation ---
    let mut moments: BTreeMap<u32, Moments> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if label != 0 {
            moments.entry(label).or_default().add(x as f64, y as f64);
        }
    }
    if moments.is_empty() {
        return Vec::new();
    }

    // --- 2. Perimeters ---
    let perimeters = crofton_perimeters(labels);

    // --- 3. Data Aggregation ---
    moments
        .into_iter()
        .map(|(id, m)| {
            let (orientation_deg, aspect_ratio) = m.ellipse();
            let perimeter_px = perimeters.get(&id).copied().unwrap_or(0.0);
            LabeledObject {
                id,
                area_px: m.count,
                perimeter_px,
                centroid: m.centroid(),
                orientation_deg,
                aspect_ratio,
                shape_factor: shape_factor(perimeter_px, m.count),
            }
        })
        .collect()
}
