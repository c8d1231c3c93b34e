use crate::acquisition::camera::types::{CameraProperties, FilterPhase, SensorType};
use crate::acquisition::common::error::Result;

/// Channel order of interleaved 3-channel output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// Order expected by most video encoders fed from OpenCV-style buffers
    Bgr,
}

/// Everything a color processor needs, captured once at session start.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorProcessorParams {
    pub sensor_type: SensorType,
    pub filter_phase: FilterPhase,
    pub color_correction_matrix: [f32; 9],
    pub white_balance_matrix: [f32; 9],
    pub bit_depth: u32,
}

impl ColorProcessorParams {
    pub fn from_properties(properties: &CameraProperties) -> Self {
        Self {
            sensor_type: properties.sensor_type,
            filter_phase: properties.filter_phase,
            color_correction_matrix: properties.color_correction_matrix,
            white_balance_matrix: properties.default_white_balance_matrix,
            bit_depth: properties.bit_depth,
        }
    }
}

pub trait ColorProcessorSdk {
    type Processor: ColorProcessor;

    fn create_processor(&mut self, params: &ColorProcessorParams) -> Result<Self::Processor>;

    /// Releases the SDK. Processors created from it must be disposed first.
    fn dispose(self) -> Result<()>;
}

pub trait ColorProcessor {
    fn set_output_order(&mut self, order: ChannelOrder);

    fn output_order(&self) -> ChannelOrder;

    /// Transforms a raw mosaic into `width * height * 3` interleaved 8-bit samples.
    fn transform_to_24(&mut self, raw: &[u16], width: usize, height: usize) -> Result<Vec<u8>>;

    fn dispose(self) -> Result<()>;
}
