use std::path::PathBuf;

use thiserror::Error;

/// Failures outside the pixel pipeline: files, codecs and external tools.
///
/// None of these are retried. Processing is deterministic, so running the
/// same step again would fail the same way.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid pipeline configuration: {0}")]
    Pipeline(#[from] pixel_dither::Error),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found on PATH")]
    ToolNotFound(&'static str),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("Invalid preset {path}: {message}")]
    Preset { path: PathBuf, message: String },

    #[error("Output exists (use --overwrite): {0}")]
    OutputExists(PathBuf),

    #[error("Frame {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameSize {
        index: usize,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Cancelled after {frames} frames")]
    Cancelled { frames: usize },
}

impl AppError {
    /// Map a spawn error: a missing binary is reported as [`AppError::ToolNotFound`].
    pub fn spawn(tool: &'static str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::ToolNotFound(tool)
        } else {
            AppError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_is_wrapped() {
        let core = pixel_dither::Levels::from_color_count(1).unwrap_err();
        let error: AppError = core.into();
        assert_eq!(
            error.to_string(),
            "Invalid pipeline configuration: invalid colors: must be >= 2, got 1"
        );
    }

    #[test]
    fn test_tool_failed_carries_stderr() {
        let error = AppError::ToolFailed {
            tool: "ffmpeg",
            status: "exit status: 1".to_string(),
            stderr: "in.mp4: No such file or directory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "ffmpeg exited with exit status: 1: in.mp4: No such file or directory"
        );
    }

    #[test]
    fn test_spawn_not_found_maps_to_tool_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            AppError::spawn("ffprobe", err),
            AppError::ToolNotFound("ffprobe")
        ));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(AppError::spawn("ffprobe", err), AppError::Io(_)));
    }

    #[test]
    fn test_frame_size_message() {
        let error = AppError::FrameSize {
            index: 7,
            width: 64,
            height: 48,
            actual_width: 32,
            actual_height: 24,
        };
        assert_eq!(error.to_string(), "Frame 7 is 32x24, expected 64x48");
    }

    #[test]
    fn test_output_exists_message() {
        let error = AppError::OutputExists(PathBuf::from("out.mp4"));
        assert_eq!(error.to_string(), "Output exists (use --overwrite): out.mp4");
    }
}
