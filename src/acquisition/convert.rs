//! Frame to 8-bit conversion
//!
//! Monochrome frames are reduced with one of two explicitly chosen
//! [`Normalization`] strategies; color frames go through a [`ColorProcessor`].

use tracing::trace;

use crate::acquisition::camera::types::{Frame, SensorType};
use crate::acquisition::color::{ChannelOrder, ColorProcessor};
use crate::acquisition::common::error::{AcquisitionError, Result};

/// Layout of an 8-bit processed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray8,
    Rgb8,
    Bgr8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
        }
    }

    pub fn is_color(self) -> bool {
        self != PixelLayout::Gray8
    }
}

impl From<ChannelOrder> for PixelLayout {
    fn from(order: ChannelOrder) -> Self {
        match order {
            ChannelOrder::Rgb => PixelLayout::Rgb8,
            ChannelOrder::Bgr => PixelLayout::Bgr8,
        }
    }
}

/// 8-bit image ready for a sink
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub width: usize,
    pub height: usize,
    pub layout: PixelLayout,
    /// Row-major, channels interleaved
    pub data: Vec<u8>,
    pub frame_number: u64,
}

impl ProcessedImage {
    /// RGB triple at (x, y), expanding gray to all three channels.
    pub fn rgb_at(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = (y * self.width + x) * self.layout.channels();
        match self.layout {
            PixelLayout::Gray8 => {
                let v = self.data[idx];
                (v, v, v)
            }
            PixelLayout::Rgb8 => (self.data[idx], self.data[idx + 1], self.data[idx + 2]),
            PixelLayout::Bgr8 => (self.data[idx + 2], self.data[idx + 1], self.data[idx]),
        }
    }
}

/// How monochrome samples are reduced to 8 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Drop the low `bit_depth - 8` bits. Truncates, never rounds.
    BitShift,
    /// Rescale the frame's observed `[min, max]` to `[0, 255]`.
    MinMax,
}

/// Conversion chosen once per session from the sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPolicy {
    Mono(Normalization),
    Color(ChannelOrder),
}

impl ConversionPolicy {
    pub fn for_sensor(sensor_type: SensorType, normalization: Normalization, order: ChannelOrder) -> Self {
        match sensor_type {
            SensorType::Monochrome => ConversionPolicy::Mono(normalization),
            SensorType::Bayer => ConversionPolicy::Color(order),
        }
    }

    pub fn layout(self) -> PixelLayout {
        match self {
            ConversionPolicy::Mono(_) => PixelLayout::Gray8,
            ConversionPolicy::Color(order) => order.into(),
        }
    }
}

/// Converts one raw frame according to `policy`.
///
/// `processor` must be present for color policies.
pub fn convert_frame<P: ColorProcessor>(
    frame: &Frame,
    policy: ConversionPolicy,
    processor: Option<&mut P>,
) -> Result<ProcessedImage> {
    if frame.data.len() != frame.width * frame.height {
        return Err(AcquisitionError::InvalidDimensions(frame.width, frame.height));
    }

    let (layout, data) = match policy {
        ConversionPolicy::Mono(Normalization::BitShift) => {
            (PixelLayout::Gray8, shift_to_8bit(&frame.data, frame.bit_depth))
        }
        ConversionPolicy::Mono(Normalization::MinMax) => {
            (PixelLayout::Gray8, normalize_min_max(&frame.data))
        }
        ConversionPolicy::Color(order) => {
            let processor = processor.ok_or_else(|| {
                AcquisitionError::ColorProcessing("no color processor for color sensor".to_string())
            })?;
            if processor.output_order() != order {
                processor.set_output_order(order);
            }
            let data = processor.transform_to_24(&frame.data, frame.width, frame.height)?;
            (PixelLayout::from(order), data)
        }
    };

    trace!(frame = frame.frame_number, ?layout, "Converted frame");
    Ok(ProcessedImage {
        width: frame.width,
        height: frame.height,
        layout,
        data,
        frame_number: frame.frame_number,
    })
}

/// `v >> (bit_depth - 8)` for every sample, saturating at 255 for samples
/// outside the declared bit depth. Depths of 8 bits or less pass through.
pub fn shift_to_8bit(samples: &[u16], bit_depth: u32) -> Vec<u8> {
    let shift = bit_depth.saturating_sub(8);
    samples
        .iter()
        .map(|&v| (v >> shift).min(u8::MAX as u16) as u8)
        .collect()
}

/// Linear min-max rescale to `[0, 255]`, rounding to nearest.
///
/// A flat frame has no range to stretch and maps to all zeros.
pub fn normalize_min_max(samples: &[u16]) -> Vec<u8> {
    let (Some(&min), Some(&max)) = (samples.iter().min(), samples.iter().max()) else {
        return Vec::new();
    };
    if max == min {
        return vec![0; samples.len()];
    }

    let scale = 255.0 / (max - min) as f64;
    samples
        .iter()
        .map(|&v| ((v - min) as f64 * scale).round() as u8)
        .collect()
}
