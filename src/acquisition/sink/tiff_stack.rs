use std::fs::File;
use std::path::{Path, PathBuf};

use tiff::encoder::{TiffEncoder, colortype};
use tracing::{debug, info};

use crate::acquisition::common::error::{AcquisitionError, Result};
use crate::acquisition::convert::{PixelLayout, ProcessedImage};
use crate::acquisition::sink::frame_sink::{FrameSink, SinkSpec, prepare_output_path};
use crate::acquisition::sink::types::TiffCompression;

/// Writes every frame as one page of a multi-page TIFF.
pub struct TiffStackWriter {
    path: PathBuf,
    spec: SinkSpec,
    encoder: Option<TiffEncoder<File>>,
    pages: usize,
}

impl TiffStackWriter {
    /// Opens `path`, replacing any existing file.
    pub fn create(
        path: impl AsRef<Path>,
        spec: SinkSpec,
        compression: TiffCompression,
        predictor: Option<u16>,
    ) -> Result<Self> {
        let path = path.as_ref();
        if spec.width == 0 || spec.height == 0 {
            return Err(AcquisitionError::InvalidDimensions(spec.width, spec.height));
        }
        prepare_output_path(path)?;

        let file = File::create(path)?;
        let compression = match compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Balanced),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Best),
        };

        let mut encoder = TiffEncoder::new(file)
            .map_err(|e| AcquisitionError::SinkWrite(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor_val) = predictor {
            let predictor = match predictor_val {
                2 => tiff::tags::Predictor::Horizontal,
                _ => tiff::tags::Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        info!(
            path = %path.display(),
            width = spec.width,
            height = spec.height,
            color = spec.is_color,
            "Opened TIFF stack"
        );

        Ok(Self {
            path: path.to_path_buf(),
            spec,
            encoder: Some(encoder),
            pages: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pages(&self) -> usize {
        self.pages
    }
}

impl FrameSink for TiffStackWriter {
    fn write(&mut self, image: &ProcessedImage) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| AcquisitionError::SinkWrite("TIFF stack already released".to_string()))?;

        if image.width != self.spec.width || image.height != self.spec.height {
            return Err(AcquisitionError::InvalidDimensions(image.width, image.height));
        }
        if image.layout.is_color() != self.spec.is_color {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "{:?} frame in a {} stack",
                image.layout,
                if self.spec.is_color { "color" } else { "grayscale" }
            )));
        }

        let width = image.width as u32;
        let height = image.height as u32;
        let result = match image.layout {
            PixelLayout::Gray8 => encoder.write_image::<colortype::Gray8>(width, height, &image.data),
            PixelLayout::Rgb8 => encoder.write_image::<colortype::RGB8>(width, height, &image.data),
            PixelLayout::Bgr8 => {
                let rgb: Vec<u8> = image
                    .data
                    .chunks_exact(3)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect();
                encoder.write_image::<colortype::RGB8>(width, height, &rgb)
            }
        };
        result.map_err(|e| AcquisitionError::SinkWrite(e.to_string()))?;

        self.pages += 1;
        debug!(page = self.pages, frame = image.frame_number, "Wrote TIFF page");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // Dropping the encoder closes the file; every page is complete once written
        if self.encoder.take().is_some() {
            info!(path = %self.path.display(), pages = self.pages, "Closed TIFF stack");
        }
        Ok(())
    }
}
