//! Error type for the pixel-dither public API.
//!
//! Errors only arise at the boundary: building a [`PipelineConfig`] from
//! untrusted values, or wrapping a raw sample buffer in an [`Image`]. Once
//! inputs are valid, every quantizer, dither and resampling function is
//! total.
//!
//! [`PipelineConfig`]: crate::PipelineConfig
//! [`Image`]: crate::Image

use thiserror::Error;

/// Errors reported by pixel-dither.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A configuration value is outside its documented range.
    #[error("invalid {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending field, as spelled on the command line.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },

    /// A raw buffer does not describe a non-empty 3-channel image.
    #[error("shape mismatch: {width}x{height} RGB image cannot hold {len} samples")]
    ShapeMismatch {
        width: usize,
        height: usize,
        len: usize,
    },
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let error = Error::invalid("colors", "must be >= 2, got 1");
        assert_eq!(error.to_string(), "invalid colors: must be >= 2, got 1");
    }

    #[test]
    fn test_shape_mismatch_message() {
        let error = Error::ShapeMismatch {
            width: 2,
            height: 2,
            len: 11,
        };
        assert_eq!(
            error.to_string(),
            "shape mismatch: 2x2 RGB image cannot hold 11 samples"
        );
    }
}
