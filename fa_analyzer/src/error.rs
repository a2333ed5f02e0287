// THEORY:
// A single error type for the whole library. Each stage of the analysis (decoding,
// validation, segmentation, export) surfaces failures through `AnalysisError` so
// the batch driver can decide, per image, whether to skip and continue or abort.
// Data-dependent "failures" such as an empty mask are NOT errors: they produce
// undefined (`None`/NaN) measurements instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode or encode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Intensity image and mask must cover the same pixel grid.
    #[error("image is {image_width}x{image_height} but mask is {mask_width}x{mask_height}")]
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    /// The label raster is exported as 16-bit; ids above `u16::MAX` cannot be stored.
    #[error("{count} objects found, label raster supports at most {max}")]
    TooManyLabels { count: usize, max: usize },

    /// Rows can only be appended to a table with the same columns.
    #[error("cannot append a table with columns [{found}] to one with columns [{expected}]")]
    ColumnMismatch { expected: String, found: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AnalysisError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
