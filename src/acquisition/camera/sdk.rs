use std::time::Duration;

use crate::acquisition::camera::types::{CameraProperties, CameraSettings, Frame};
use crate::acquisition::common::error::Result;

/// Entry point of a camera SDK: discovers and opens cameras.
pub trait CameraSdk {
    type Camera: Camera;

    /// Returns the identifiers of every camera currently available, possibly none.
    fn discover_cameras(&mut self) -> Result<Vec<String>>;

    fn open_camera(&mut self, camera_id: &str) -> Result<Self::Camera>;

    /// Releases the SDK. Every camera opened from it must be closed first.
    fn dispose(self) -> Result<()>;
}

/// An opened camera handle.
pub trait Camera {
    fn properties(&self) -> &CameraProperties;

    fn configure(&mut self, settings: &CameraSettings) -> Result<()>;

    /// Prepares the camera to respond to triggers with `buffer_depth` frame buffers.
    fn arm(&mut self, buffer_depth: u32) -> Result<()>;

    fn issue_software_trigger(&mut self) -> Result<()>;

    /// Waits at most `timeout` for the next frame; `Ok(None)` when none arrived.
    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<Frame>>;

    fn disarm(&mut self) -> Result<()>;

    fn close(self) -> Result<()>;
}
