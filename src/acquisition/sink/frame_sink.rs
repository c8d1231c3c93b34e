use std::path::Path;

use tracing::info;

use crate::acquisition::common::error::Result;
use crate::acquisition::convert::ProcessedImage;

/// Geometry and rate a sink is opened with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkSpec {
    pub width: usize,
    pub height: usize,
    /// Playback rate for video containers
    pub frame_rate_hz: f64,
    pub is_color: bool,
}

pub trait FrameSink {
    /// Delivers one processed frame.
    fn write(&mut self, image: &ProcessedImage) -> Result<()>;

    /// Finalizes the output. Writes after release fail.
    fn release(&mut self) -> Result<()>;

    /// Called when a poll returned no frame, so a sink that reads user input
    /// keeps doing so while the camera is silent.
    fn idle(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write(&mut self, image: &ProcessedImage) -> Result<()> {
        (**self).write(image)
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }

    fn idle(&mut self) -> Result<()> {
        (**self).idle()
    }
}

/// Deletes a previous output at `path` so a new export never appends to it.
pub fn prepare_output_path(path: &Path) -> Result<()> {
    if path.exists() {
        info!(path = %path.display(), "Removing existing output");
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
