use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use tracing::{debug, trace};

use crate::acquisition::camera::types::{FilterPhase, SensorType};
use crate::acquisition::color::processor::{
    ChannelOrder, ColorProcessor, ColorProcessorParams, ColorProcessorSdk,
};
use crate::acquisition::common::error::{AcquisitionError, Result};

/// CPU color processing SDK built on the `bayer` demosaicing crate.
#[derive(Default)]
pub struct BayerColorSdk {
    live_processors: Arc<AtomicUsize>,
}

impl BayerColorSdk {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ColorProcessorSdk for BayerColorSdk {
    type Processor = BayerColorProcessor;

    fn create_processor(&mut self, params: &ColorProcessorParams) -> Result<BayerColorProcessor> {
        if params.sensor_type != SensorType::Bayer {
            return Err(AcquisitionError::ColorProcessing(format!(
                "cannot color process a {} sensor",
                params.sensor_type
            )));
        }
        if !(8..=16).contains(&params.bit_depth) {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "{}-bit samples",
                params.bit_depth
            )));
        }

        // Cam -> corrected RGB: apply white balance first, then color correction
        let matrix = multiply(&params.color_correction_matrix, &params.white_balance_matrix);
        self.live_processors.fetch_add(1, Ordering::SeqCst);
        debug!(phase = ?params.filter_phase, bit_depth = params.bit_depth, "Created color processor");

        Ok(BayerColorProcessor {
            cfa: cfa_for(params.filter_phase),
            matrix,
            max_value: ((1u32 << params.bit_depth) - 1) as f32,
            order: ChannelOrder::Rgb,
            live_processors: self.live_processors.clone(),
        })
    }

    fn dispose(self) -> Result<()> {
        let live = self.live_processors.load(Ordering::SeqCst);
        if live > 0 {
            return Err(AcquisitionError::disposal(
                "color processor sdk",
                format!("{} processor(s) still alive", live),
            ));
        }
        debug!("Color processor SDK disposed");
        Ok(())
    }
}

pub struct BayerColorProcessor {
    cfa: CFA,
    /// Row-major CCM x WB
    matrix: [f32; 9],
    max_value: f32,
    order: ChannelOrder,
    live_processors: Arc<AtomicUsize>,
}

impl ColorProcessor for BayerColorProcessor {
    fn set_output_order(&mut self, order: ChannelOrder) {
        self.order = order;
    }

    fn output_order(&self) -> ChannelOrder {
        self.order
    }

    fn transform_to_24(&mut self, raw: &[u16], width: usize, height: usize) -> Result<Vec<u8>> {
        if width < 2 || height < 2 || raw.len() != width * height {
            return Err(AcquisitionError::InvalidDimensions(width, height));
        }
        trace!(width, height, "Demosaicing frame");

        let bayer_bytes: Vec<u8> = raw.iter().flat_map(|&val| val.to_le_bytes()).collect();
        let mut rgb16 = vec![0u8; width * height * 3 * 2];
        {
            let mut cursor = Cursor::new(&bayer_bytes[..]);
            let mut raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut rgb16);
            bayer::run_demosaic(
                &mut cursor,
                BayerDepth::Depth16LE,
                self.cfa,
                Demosaic::Linear,
                &mut raster,
            )
            .map_err(|e| AcquisitionError::ColorProcessing(format!("demosaic failed: {:?}", e)))?;
        }

        let m = &self.matrix;
        let scale = 255.0 / self.max_value;
        let mut output = Vec::with_capacity(width * height * 3);
        for pixel in rgb16.chunks_exact(6) {
            let r = u16::from_ne_bytes([pixel[0], pixel[1]]) as f32 * scale;
            let g = u16::from_ne_bytes([pixel[2], pixel[3]]) as f32 * scale;
            let b = u16::from_ne_bytes([pixel[4], pixel[5]]) as f32 * scale;

            let r_out = to_u8(m[0] * r + m[1] * g + m[2] * b);
            let g_out = to_u8(m[3] * r + m[4] * g + m[5] * b);
            let b_out = to_u8(m[6] * r + m[7] * g + m[8] * b);

            match self.order {
                ChannelOrder::Rgb => output.extend_from_slice(&[r_out, g_out, b_out]),
                ChannelOrder::Bgr => output.extend_from_slice(&[b_out, g_out, r_out]),
            }
        }
        Ok(output)
    }

    fn dispose(self) -> Result<()> {
        self.live_processors.fetch_sub(1, Ordering::SeqCst);
        debug!("Color processor disposed");
        Ok(())
    }
}

fn cfa_for(phase: FilterPhase) -> CFA {
    match phase {
        FilterPhase::BayerRed => CFA::RGGB,
        FilterPhase::BayerBlue => CFA::BGGR,
        FilterPhase::GreenLeftOfRed => CFA::GRBG,
        FilterPhase::GreenLeftOfBlue => CFA::GBRG,
    }
}

fn multiply(a: &[f32; 9], b: &[f32; 9]) -> [f32; 9] {
    let mut out = [0.0f32; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 3 + c] = (0..3).map(|k| a[r * 3 + k] * b[k * 3 + c]).sum();
        }
    }
    out
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::camera::types::IDENTITY_MATRIX;

    fn params(white_balance_matrix: [f32; 9]) -> ColorProcessorParams {
        ColorProcessorParams {
            sensor_type: SensorType::Bayer,
            filter_phase: FilterPhase::BayerRed,
            color_correction_matrix: IDENTITY_MATRIX,
            white_balance_matrix,
            bit_depth: 12,
        }
    }

    #[test]
    fn test_mono_sensor_rejected() {
        let mut sdk = BayerColorSdk::new();
        let mut mono = params(IDENTITY_MATRIX);
        mono.sensor_type = SensorType::Monochrome;
        assert!(matches!(
            sdk.create_processor(&mono),
            Err(AcquisitionError::ColorProcessing(_))
        ));
    }

    #[test]
    fn test_uniform_full_scale_is_white() {
        let mut sdk = BayerColorSdk::new();
        let mut processor = sdk.create_processor(&params(IDENTITY_MATRIX)).unwrap();

        let raw = vec![4095u16; 4 * 4];
        let rgb = processor.transform_to_24(&raw, 4, 4).unwrap();

        assert_eq!(rgb.len(), 4 * 4 * 3);
        assert!(rgb.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_channel_order_respected() {
        let mut sdk = BayerColorSdk::new();
        // Keep only red
        let red_only = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let mut processor = sdk.create_processor(&params(red_only)).unwrap();
        let raw = vec![4095u16; 4 * 4];

        processor.set_output_order(ChannelOrder::Rgb);
        let rgb = processor.transform_to_24(&raw, 4, 4).unwrap();
        assert_eq!(&rgb[..3], &[255, 0, 0]);

        processor.set_output_order(ChannelOrder::Bgr);
        let bgr = processor.transform_to_24(&raw, 4, 4).unwrap();
        assert_eq!(&bgr[..3], &[0, 0, 255]);
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let mut sdk = BayerColorSdk::new();
        let mut processor = sdk.create_processor(&params(IDENTITY_MATRIX)).unwrap();
        let result = processor.transform_to_24(&[0u16; 10], 4, 4);
        assert!(matches!(result, Err(AcquisitionError::InvalidDimensions(4, 4))));
    }

    #[test]
    fn test_sdk_dispose_requires_disposed_processors() {
        let mut sdk = BayerColorSdk::new();
        let processor = sdk.create_processor(&params(IDENTITY_MATRIX)).unwrap();
        processor.dispose().unwrap();
        assert!(sdk.dispose().is_ok());

        let mut sdk = BayerColorSdk::new();
        let _processor = sdk.create_processor(&params(IDENTITY_MATRIX)).unwrap();
        assert!(matches!(
            sdk.dispose(),
            Err(AcquisitionError::DisposalFailure { .. })
        ));
    }

    #[test]
    fn test_matrix_multiply_identity() {
        let m = [2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.5];
        assert_eq!(multiply(&IDENTITY_MATRIX, &m), m);
        assert_eq!(multiply(&m, &IDENTITY_MATRIX), m);
    }
}
