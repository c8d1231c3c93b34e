use tracing::{info, instrument};

use crate::acquisition::acquisition_loop::LoopSummary;
use crate::acquisition::camera::CameraSdk;
use crate::acquisition::color::BayerColorSdk;
use crate::acquisition::common::error::Result;
#[cfg(not(feature = "mp4"))]
use crate::acquisition::common::error::AcquisitionError;
use crate::acquisition::common::stop::StopSignal;
use crate::acquisition::config::ExportConfig;
use crate::acquisition::session::Session;
#[cfg(feature = "mp4")]
use crate::acquisition::sink::Mp4Writer;
use crate::acquisition::sink::{ExportFormat, FrameSink, SinkSpec, TiffStackWriter};

/// Opens the file writer selected by `config.format`.
pub fn open_export_sink(config: &ExportConfig, spec: &SinkSpec) -> Result<Box<dyn FrameSink>> {
    match config.format {
        ExportFormat::TiffStack => Ok(Box::new(TiffStackWriter::create(
            &config.output,
            *spec,
            config.compression,
            config.predictor,
        )?)),
        #[cfg(feature = "mp4")]
        ExportFormat::Mp4(codec) => Ok(Box::new(Mp4Writer::create(&config.output, *spec, codec)?)),
        #[cfg(not(feature = "mp4"))]
        ExportFormat::Mp4(codec) => Err(AcquisitionError::UnsupportedFormat(format!(
            "MP4 ({}) export requires the `mp4` feature",
            codec.fourcc()
        ))),
    }
}

/// Captures `config.frame_count` frames from the first camera into `config.output`.
///
/// A poll timeout or an interrupt aborts the export; the session is torn down
/// either way.
#[instrument(skip_all, fields(frames = config.frame_count, output = %config.output.display()))]
pub fn export<S: CameraSdk>(sdk: S, config: &ExportConfig, stop: &StopSignal) -> Result<LoopSummary> {
    info!(format = ?config.format, "Starting export");

    let session = Session::open(
        sdk,
        &config.session_options(),
        || Ok(BayerColorSdk::new()),
        |spec| open_export_sink(config, spec),
    )?;

    let summary = session.run_and_close(&config.acquisition_loop(), stop)?;
    info!(
        frames = summary.frames_delivered,
        output = %config.output.display(),
        "Export complete"
    );
    Ok(summary)
}
