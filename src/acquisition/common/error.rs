use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("No cameras detected")]
    DeviceNotFound,

    #[error("Timeout of {timeout_ms}ms reached while polling for a frame ({frames_written} frames written)")]
    FrameTimeout { timeout_ms: u128, frames_written: usize },

    #[error("No frame received")]
    NoFrameAvailable,

    #[error("Unable to dispose {resource}: {reason}")]
    DisposalFailure { resource: &'static str, reason: String },

    #[error("Acquisition interrupted after {frames_written} frames")]
    Interrupted { frames_written: usize },

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Color processing error: {0}")]
    ColorProcessing(String),

    #[error("Failed to write frame to sink: {0}")]
    SinkWrite(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AcquisitionError {
    pub fn frame_timeout(timeout: Duration, frames_written: usize) -> Self {
        Self::FrameTimeout {
            timeout_ms: timeout.as_millis(),
            frames_written,
        }
    }

    pub fn disposal(resource: &'static str, reason: impl ToString) -> Self {
        Self::DisposalFailure {
            resource,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
