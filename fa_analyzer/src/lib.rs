// THEORY:
// This file is the main entry point for the `fa_analyzer` library crate.
// It exposes the `AnalysisPipeline` and its associated data structures
// (`PipelineConfig`, `ImageAnalysis`, `FocalAdhesion`) as the high-level interface
// for analyzing one image, and the `batch` module for analyzing a whole directory.
//
// The measurement modules live under `core_modules`. They are public so that
// callers can plug in their own `Segmenter` or reuse a single measurement, but most
// users only need the pipeline and the batch driver.

pub mod batch;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use batch::{BatchReport, analyze_directory};
pub use core_modules::segmentation::{PrecomputedLabels, Segmenter, ThresholdSegmenter};
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisPipeline, FocalAdhesion, ImageAnalysis, PipelineConfig};
