// THEORY:
// The `pipeline` module is the top-level API of the analysis engine. It wires the
// core modules into a single call: give it an intensity image and a cell mask, get
// back every focal adhesion with its measurements plus the per-image summary.
//
// Stages:
// 1.  **Validation**: images must share dimensions; the mask is binarized.
// 2.  **Cell Geometry**: the mask becomes a `CellMask` (area, centroid, distance map).
// 3.  **Segmentation**: the configured `Segmenter` produces a label raster.
// 4.  **Morphometry**: each label becomes a `LabeledObject`.
// 5.  **Cell Relations**: each object is placed relative to the mask.
// 6.  **Aggregation**: the objects are folded into an `ImageSummary`.

use crate::core_modules::cell_mask::CellMask;
use crate::core_modules::raster::{self, LabelImage};
use crate::core_modules::region_props::{LabeledObject, measure_objects};
use crate::core_modules::relations::relations::{CellRelation, relate};
use crate::core_modules::segmentation::{Segmenter, ThresholdSegmenter};
use crate::core_modules::summary::{ImageSummary, summarize};
use crate::error::{AnalysisError, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Configuration for the analysis, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Objects closer to the border than this fraction of the mask's maximum
    /// border distance are counted as peripheral.
    pub periph_frac: f64,
    /// Suffix that turns `<name><ext>` into the mask file `<name><suffix><ext>`.
    pub mask_suffix: String,
    /// Image file extension, including the dot.
    pub file_ending: String,
    /// Gaussian sigma applied before thresholding.
    pub blur_sigma: f32,
    /// Connected components smaller than this many pixels are discarded.
    pub min_object_px: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            periph_frac: 0.1,
            mask_suffix: "_mask".to_string(),
            file_ending: ".tif".to_string(),
            blur_sigma: 1.0,
            min_object_px: 10,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON configuration; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|source| AnalysisError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.periph_frac) {
            return Err(AnalysisError::invalid_config(format!(
                "periph_frac must be within [0, 1], got {}",
                self.periph_frac
            )));
        }
        if !(self.blur_sigma > 0.0) {
            return Err(AnalysisError::invalid_config(format!(
                "blur_sigma must be positive, got {}",
                self.blur_sigma
            )));
        }
        if self.file_ending.is_empty() {
            return Err(AnalysisError::invalid_config("file_ending must not be empty"));
        }
        if self.mask_suffix.is_empty() {
            return Err(AnalysisError::invalid_config("mask_suffix must not be empty"));
        }
        Ok(())
    }

    /// The segmenter described by this configuration.
    pub fn segmenter(&self) -> ThresholdSegmenter {
        ThresholdSegmenter {
            blur_sigma: self.blur_sigma,
            min_object_px: self.min_object_px,
            ..ThresholdSegmenter::default()
        }
    }
}

/// One focal adhesion: its own shape and its placement in the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FocalAdhesion {
    pub object: LabeledObject,
    pub relation: CellRelation,
}

/// The complete result for one image/mask pair.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub adhesions: Vec<FocalAdhesion>,
    pub summary: ImageSummary,
    /// Pixel value = adhesion id.
    pub labels: LabelImage,
}

/// The main, top-level struct for the analysis engine.
pub struct AnalysisPipeline<S: Segmenter = ThresholdSegmenter> {
    config: PipelineConfig,
    segmenter: S,
}

impl AnalysisPipeline<ThresholdSegmenter> {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let segmenter = config.segmenter();
        Ok(Self { config, segmenter })
    }
}

impl<S: Segmenter> AnalysisPipeline<S> {
    /// Uses a custom segmentation collaborator instead of the threshold default.
    pub fn with_segmenter(config: PipelineConfig, segmenter: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, segmenter })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn analyze(&self, basename: &str, intensity: &GrayImage, mask: &GrayImage) -> Result<ImageAnalysis> {
        // Stage 1: Validation
        raster::check_dimensions(intensity, mask)?;
        let mask = raster::binarize(mask);

        // Stage 2: Cell Geometry
        let cell = CellMask::from_binary(&mask);
        debug!(
            basename,
            mask_area_px = cell.area_px,
            max_distance = cell.max_distance,
            "cell mask measured"
        );

        // Stage 3: Segmentation
        let labels = self.segmenter.segment(intensity, &mask)?;

        // Stage 4 & 5: Morphometry and Cell Relations
        let adhesions: Vec<FocalAdhesion> = measure_objects(&labels)
            .into_iter()
            .map(|object| {
                let relation = relate(&object, &cell);
                FocalAdhesion { object, relation }
            })
            .collect();
        debug!(basename, count = adhesions.len(), "focal adhesions measured");

        // Stage 6: Aggregation
        let summary = summarize(basename, &cell, &adhesions, self.config.periph_frac);

        Ok(ImageAnalysis {
            adhesions,
            summary,
            labels,
        })
    }
}
