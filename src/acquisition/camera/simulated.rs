//! Synthetic camera that produces a moving gradient at a fixed frame rate.
//!
//! Follows the same arm / trigger / poll rules as the vendor SDK so the
//! acquisition pipeline can be exercised without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::acquisition::camera::cadence::FrameCadence;
use crate::acquisition::camera::sdk::{Camera, CameraSdk};
use crate::acquisition::camera::types::{
    CameraProperties, CameraSettings, FilterPhase, Frame, IDENTITY_MATRIX, SensorType,
};
use crate::acquisition::common::error::{AcquisitionError, Result};

/// Exposure at which the simulated sensor reaches full scale.
const FULL_SCALE_EXPOSURE_US: u32 = 10_000;

/// Diagonal shift of the gradient between consecutive frames, in pixels.
const GRADIENT_STEP: usize = 4;

/// Configuration for one simulated camera
#[derive(Debug, Clone)]
pub struct SimulatedCameraConfig {
    pub serial: String,
    pub width: usize,
    pub height: usize,
    pub bit_depth: u32,
    pub frame_rate_hz: f64,
    pub sensor_type: SensorType,
    pub filter_phase: FilterPhase,
    pub color_correction_matrix: [f32; 9],
    pub white_balance_matrix: [f32; 9],
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            serial: "SIM0001".to_string(),
            width: 640,
            height: 480,
            bit_depth: 12,
            frame_rate_hz: 30.0,
            sensor_type: SensorType::Monochrome,
            filter_phase: FilterPhase::BayerRed,
            color_correction_matrix: IDENTITY_MATRIX,
            white_balance_matrix: IDENTITY_MATRIX,
        }
    }
}

impl SimulatedCameraConfig {
    pub fn builder() -> SimulatedCameraConfigBuilder {
        SimulatedCameraConfigBuilder::default()
    }

    fn properties(&self) -> CameraProperties {
        let model = match self.sensor_type {
            SensorType::Monochrome => "Simulated Mono",
            SensorType::Bayer => "Simulated Color",
        };
        CameraProperties {
            model: model.to_string(),
            serial: self.serial.clone(),
            width: self.width,
            height: self.height,
            bit_depth: self.bit_depth,
            frame_rate_hz: self.frame_rate_hz,
            sensor_type: self.sensor_type,
            filter_phase: self.filter_phase,
            color_correction_matrix: self.color_correction_matrix,
            default_white_balance_matrix: self.white_balance_matrix,
        }
    }
}

/// Builder for SimulatedCameraConfig
#[derive(Default)]
pub struct SimulatedCameraConfigBuilder {
    serial: Option<String>,
    dimensions: Option<(usize, usize)>,
    bit_depth: Option<u32>,
    frame_rate_hz: Option<f64>,
    sensor_type: Option<SensorType>,
    filter_phase: Option<FilterPhase>,
    color_correction_matrix: Option<[f32; 9]>,
    white_balance_matrix: Option<[f32; 9]>,
}

impl SimulatedCameraConfigBuilder {
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn dimensions(mut self, width: usize, height: usize) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn bit_depth(mut self, bit_depth: u32) -> Self {
        self.bit_depth = Some(bit_depth);
        self
    }

    pub fn frame_rate_hz(mut self, frame_rate_hz: f64) -> Self {
        self.frame_rate_hz = Some(frame_rate_hz);
        self
    }

    pub fn sensor_type(mut self, sensor_type: SensorType) -> Self {
        self.sensor_type = Some(sensor_type);
        self
    }

    pub fn filter_phase(mut self, filter_phase: FilterPhase) -> Self {
        self.filter_phase = Some(filter_phase);
        self
    }

    pub fn color_correction_matrix(mut self, matrix: [f32; 9]) -> Self {
        self.color_correction_matrix = Some(matrix);
        self
    }

    pub fn white_balance_matrix(mut self, matrix: [f32; 9]) -> Self {
        self.white_balance_matrix = Some(matrix);
        self
    }

    pub fn build(self) -> SimulatedCameraConfig {
        let default = SimulatedCameraConfig::default();
        let (width, height) = self.dimensions.unwrap_or((default.width, default.height));
        SimulatedCameraConfig {
            serial: self.serial.unwrap_or(default.serial),
            width,
            height,
            bit_depth: self.bit_depth.unwrap_or(default.bit_depth),
            frame_rate_hz: self.frame_rate_hz.unwrap_or(default.frame_rate_hz),
            sensor_type: self.sensor_type.unwrap_or(default.sensor_type),
            filter_phase: self.filter_phase.unwrap_or(default.filter_phase),
            color_correction_matrix: self
                .color_correction_matrix
                .unwrap_or(default.color_correction_matrix),
            white_balance_matrix: self
                .white_balance_matrix
                .unwrap_or(default.white_balance_matrix),
        }
    }
}

/// SDK exposing a fixed set of simulated cameras.
pub struct SimulatedSdk {
    cameras: Vec<SimulatedCameraConfig>,
    open_cameras: Arc<AtomicUsize>,
}

impl SimulatedSdk {
    pub fn new(cameras: Vec<SimulatedCameraConfig>) -> Self {
        Self {
            cameras,
            open_cameras: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl CameraSdk for SimulatedSdk {
    type Camera = SimulatedCamera;

    fn discover_cameras(&mut self) -> Result<Vec<String>> {
        Ok(self.cameras.iter().map(|c| c.serial.clone()).collect())
    }

    fn open_camera(&mut self, camera_id: &str) -> Result<SimulatedCamera> {
        let config = self
            .cameras
            .iter()
            .find(|c| c.serial == camera_id)
            .ok_or_else(|| AcquisitionError::Camera(format!("unknown camera {}", camera_id)))?;

        if config.width == 0 || config.height == 0 {
            return Err(AcquisitionError::InvalidDimensions(config.width, config.height));
        }
        if !(8..=16).contains(&config.bit_depth) {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "{}-bit samples",
                config.bit_depth
            )));
        }
        if config.frame_rate_hz <= 0.0 {
            return Err(AcquisitionError::Camera(format!(
                "invalid frame rate {}",
                config.frame_rate_hz
            )));
        }

        self.open_cameras.fetch_add(1, Ordering::SeqCst);
        info!(serial = %config.serial, sensor = %config.sensor_type, "Opened simulated camera");

        Ok(SimulatedCamera {
            properties: config.properties(),
            settings: CameraSettings::default(),
            armed: false,
            triggered: false,
            frames_emitted: 0,
            frames_this_trigger: 0,
            cadence: FrameCadence::new(config.frame_rate_hz),
            open_cameras: self.open_cameras.clone(),
        })
    }

    fn dispose(self) -> Result<()> {
        let open = self.open_cameras.load(Ordering::SeqCst);
        if open > 0 {
            return Err(AcquisitionError::disposal(
                "camera sdk",
                format!("{} camera(s) still open", open),
            ));
        }
        debug!("Simulated SDK disposed");
        Ok(())
    }
}

pub struct SimulatedCamera {
    properties: CameraProperties,
    settings: CameraSettings,
    armed: bool,
    triggered: bool,
    frames_emitted: u64,
    frames_this_trigger: u32,
    cadence: FrameCadence,
    open_cameras: Arc<AtomicUsize>,
}

impl SimulatedCamera {
    fn exposure_gain(&self) -> f64 {
        match self.settings.exposure_time_us {
            Some(us) => (us as f64 / FULL_SCALE_EXPOSURE_US as f64).min(1.0),
            None => 1.0,
        }
    }

    fn render_frame(&self) -> Frame {
        let width = self.properties.width;
        let height = self.properties.height;
        let max_value = ((1u32 << self.properties.bit_depth) - 1) as f64 * self.exposure_gain();
        let span = width + height - 1;
        let offset = self.frames_emitted as usize * GRADIENT_STEP;

        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let position = (x + y + offset) % span.max(1);
                let value = position as f64 / span.max(1) as f64 * max_value;
                data.push(value as u16);
            }
        }

        Frame {
            width,
            height,
            data,
            bit_depth: self.properties.bit_depth,
            frame_number: self.frames_emitted,
        }
    }

    fn trigger_exhausted(&self) -> bool {
        self.settings.frames_per_trigger > 0
            && self.frames_this_trigger >= self.settings.frames_per_trigger
    }
}

impl Camera for SimulatedCamera {
    fn properties(&self) -> &CameraProperties {
        &self.properties
    }

    fn configure(&mut self, settings: &CameraSettings) -> Result<()> {
        if self.armed {
            return Err(AcquisitionError::Camera(
                "cannot change settings while armed".to_string(),
            ));
        }
        if let Some(rate) = settings.frame_rate_control
            && rate <= 0.0
        {
            return Err(AcquisitionError::Camera(format!("invalid frame rate {}", rate)));
        }
        debug!(?settings, "Applying camera settings");
        self.cadence.set_rate(
            settings
                .frame_rate_control
                .unwrap_or(self.properties.frame_rate_hz),
        );
        self.settings = settings.clone();
        Ok(())
    }

    fn arm(&mut self, buffer_depth: u32) -> Result<()> {
        if self.armed {
            return Err(AcquisitionError::Camera("camera is already armed".to_string()));
        }
        if buffer_depth == 0 {
            return Err(AcquisitionError::Camera("buffer depth must be at least 1".to_string()));
        }
        self.armed = true;
        debug!(buffer_depth, "Camera armed");
        Ok(())
    }

    fn issue_software_trigger(&mut self) -> Result<()> {
        if !self.armed {
            return Err(AcquisitionError::Camera(
                "software trigger issued before arming".to_string(),
            ));
        }
        self.triggered = true;
        self.frames_this_trigger = 0;
        self.cadence.start();
        Ok(())
    }

    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        if !self.armed {
            return Err(AcquisitionError::Camera("camera is not armed".to_string()));
        }

        if !self.triggered || self.trigger_exhausted() {
            std::thread::sleep(timeout);
            return Ok(None);
        }
        if !self.cadence.wait_next(timeout) {
            return Ok(None);
        }

        let frame = self.render_frame();
        self.frames_emitted += 1;
        self.frames_this_trigger += 1;
        Ok(Some(frame))
    }

    fn disarm(&mut self) -> Result<()> {
        if !self.armed {
            return Err(AcquisitionError::Camera("camera is not armed".to_string()));
        }
        self.armed = false;
        self.triggered = false;
        self.cadence.stop();
        debug!(frames = self.frames_emitted, "Camera disarmed");
        Ok(())
    }

    fn close(self) -> Result<()> {
        if self.armed {
            return Err(AcquisitionError::Camera("camera closed while armed".to_string()));
        }
        self.open_cameras.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
