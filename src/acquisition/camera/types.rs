//! Camera data types

use std::fmt;

/// Sensor layout reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Monochrome,
    /// Sensor covered by a Bayer color filter array
    Bayer,
}

impl SensorType {
    pub fn is_color(self) -> bool {
        matches!(self, SensorType::Bayer)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::Monochrome => write!(f, "monochrome"),
            SensorType::Bayer => write!(f, "bayer"),
        }
    }
}

/// Color of the top-left 2x2 cell of the color filter array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// Red at (0, 0): RGGB
    BayerRed,
    /// Blue at (0, 0): BGGR
    BayerBlue,
    /// Green at (0, 0), red to its right: GRBG
    GreenLeftOfRed,
    /// Green at (0, 0), blue to its right: GBRG
    GreenLeftOfBlue,
}

/// Read-only camera properties, captured once when the camera is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProperties {
    pub model: String,
    pub serial: String,
    pub width: usize,
    pub height: usize,
    /// Native bits per sample (e.g. 10, 12 or 16)
    pub bit_depth: u32,
    pub frame_rate_hz: f64,
    pub sensor_type: SensorType,
    pub filter_phase: FilterPhase,
    /// Row-major 3x3 color correction matrix
    pub color_correction_matrix: [f32; 9],
    /// Row-major 3x3 default white balance matrix
    pub default_white_balance_matrix: [f32; 9],
}

pub const IDENTITY_MATRIX: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Settings applied to a camera before it is armed.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub exposure_time_us: Option<u32>,
    /// Frames produced per software trigger, 0 for unlimited
    pub frames_per_trigger: u32,
    /// Target frame rate; `Some` also enables frame rate control
    pub frame_rate_control: Option<f64>,
    /// Number of frame buffers allocated when arming
    pub buffer_depth: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_time_us: None,
            frames_per_trigger: 0,
            frame_rate_control: None,
            buffer_depth: 2,
        }
    }
}

/// A single exposure's raw pixel buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    /// Row-major samples, one per pixel
    pub data: Vec<u16>,
    pub bit_depth: u32,
    pub frame_number: u64,
}
