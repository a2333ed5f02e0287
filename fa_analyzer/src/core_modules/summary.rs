// THEORY:
// `summary` folds the per-object records of one image into a single per-image row.
// It is the only place where the analysis produces statistics, and therefore the
// only place that has to decide what "undefined" means.
//
// Key principles:
// 1.  **Population Statistics**: standard deviations divide by N, not N - 1; the
//     objects of an image are the whole population, not a sample of it.
// 2.  **Mask-Relative Periphery**: an object is "peripheral" when its border distance
//     is below a fraction of the deepest point of the cell, so the threshold scales
//     with cell size.
// 3.  **Undefined Is `None`**: a statistic over nothing (no objects, empty mask) is
//     `None`, never zero and never a panic. Non-finite inputs are ignored.

use crate::core_modules::cell_mask::CellMask;
use crate::pipeline::FocalAdhesion;

/// A per-object quantity that is summarized per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Area,
    Perimeter,
    Orientation,
    AspectRatio,
    ShapeFactor,
    BorderDistance,
    RelativeOrientation,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Area,
        Metric::Perimeter,
        Metric::Orientation,
        Metric::AspectRatio,
        Metric::ShapeFactor,
        Metric::BorderDistance,
        Metric::RelativeOrientation,
    ];

    /// Column name used in the output tables.
    pub fn column(self) -> &'static str {
        match self {
            Metric::Area => "fa_area_px",
            Metric::Perimeter => "perim_px",
            Metric::Orientation => "orientation_deg",
            Metric::AspectRatio => "ar",
            Metric::ShapeFactor => "sf",
            Metric::BorderDistance => "dist_px",
            Metric::RelativeOrientation => "rel_orientation_deg",
        }
    }

    pub fn value(self, fa: &FocalAdhesion) -> f64 {
        match self {
            Metric::Area => fa.object.area_px,
            Metric::Perimeter => fa.object.perimeter_px,
            Metric::Orientation => fa.object.orientation_deg,
            Metric::AspectRatio => fa.object.aspect_ratio,
            Metric::ShapeFactor => fa.object.shape_factor,
            Metric::BorderDistance => fa.relation.border_distance_px,
            Metric::RelativeOrientation => fa.relation.relative_orientation_deg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// The per-image row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSummary {
    pub basename: String,
    pub mask_area_px: f64,
    pub fa_count: usize,
    /// Summed object area over mask area.
    pub area_fraction: Option<f64>,
    /// Share of objects closer to the border than the peripheral threshold.
    pub peripheral_fraction: Option<f64>,
    /// One entry per `Metric::ALL`, in the same order.
    pub stats: Vec<MetricStats>,
}

impl ImageSummary {
    pub fn stats(&self, metric: Metric) -> MetricStats {
        Metric::ALL
            .iter()
            .position(|m| *m == metric)
            .and_then(|i| self.stats.get(i).copied())
            .unwrap_or_default()
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Standard deviation with an N denominator.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let variance = finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / finite.len() as f64;
    Some(variance.sqrt())
}

pub fn area_fraction(total_object_area_px: f64, mask_area_px: f64) -> Option<f64> {
    (mask_area_px > 0.0).then(|| total_object_area_px / mask_area_px)
}

/// Fraction of `distances` strictly below `periph_frac * max_distance`.
pub fn peripheral_fraction(distances: &[f64], max_distance: f64, periph_frac: f64) -> Option<f64> {
    if distances.is_empty() || !max_distance.is_finite() {
        return None;
    }
    let threshold = max_distance * periph_frac;
    let peripheral = distances.iter().filter(|d| **d < threshold).count();
    Some(peripheral as f64 / distances.len() as f64)
}

/// Builds the per-image row for one analyzed image.
pub fn summarize(
    basename: &str,
    mask: &CellMask,
    adhesions: &[FocalAdhesion],
    periph_frac: f64,
) -> ImageSummary {
    let mask_area_px = mask.area_px as f64;
    let stats = Metric::ALL
        .iter()
        .map(|metric| {
            let values: Vec<f64> = adhesions.iter().map(|fa| metric.value(fa)).collect();
            MetricStats {
                mean: mean(&values),
                std: population_std(&values),
            }
        })
        .collect();

    let total_area: f64 = adhesions.iter().map(|fa| fa.object.area_px).sum();
    let distances: Vec<f64> = adhesions
        .iter()
        .map(|fa| fa.relation.border_distance_px)
        .collect();

    ImageSummary {
        basename: basename.to_string(),
        mask_area_px,
        fa_count: adhesions.len(),
        area_fraction: area_fraction(total_area, mask_area_px),
        peripheral_fraction: if mask.area_px == 0 {
            None
        } else {
            peripheral_fraction(&distances, mask.max_distance, periph_frac)
        },
        stats,
    }
}
