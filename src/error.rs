use thiserror::Error;

/// Errors raised by the detection core and its raster helpers.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// RGB tile and forest mask (or a raw buffer and its declared shape) disagree.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Mask handed to blob extraction is not a usable binary image.
    #[error("Invalid mask: {reason}")]
    InvalidMask { reason: String },

    /// Detector or preprocessor parameters are out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The affine transform cannot be inverted.
    #[error("Degenerate affine transform (determinant {determinant})")]
    DegenerateTransform { determinant: f64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl DetectionError {
    pub(crate) fn shape_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::ShapeMismatch {
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_mask(reason: impl Into<String>) -> Self {
        Self::InvalidMask {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectionError>;
