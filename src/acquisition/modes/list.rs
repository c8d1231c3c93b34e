use tracing::{info, warn};

use crate::acquisition::camera::{Camera, CameraProperties, CameraSdk};
use crate::acquisition::common::error::Result;

/// Opens every discovered camera long enough to read its properties.
pub fn describe_cameras<S: CameraSdk>(mut sdk: S) -> Result<Vec<CameraProperties>> {
    let result = read_properties(&mut sdk);
    if let Err(e) = sdk.dispose() {
        warn!("{}", e);
    }
    result
}

fn read_properties<S: CameraSdk>(sdk: &mut S) -> Result<Vec<CameraProperties>> {
    let ids = sdk.discover_cameras()?;
    info!(count = ids.len(), "Cameras discovered");

    let mut cameras = Vec::with_capacity(ids.len());
    for id in &ids {
        let camera = sdk.open_camera(id)?;
        cameras.push(camera.properties().clone());
        camera.close()?;
    }
    Ok(cameras)
}
