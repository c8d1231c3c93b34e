use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use tsi_capture_rs::acquisition::camera::{
    CameraSdk, RawReplaySdk, SensorType, SimulatedCameraConfig, SimulatedSdk,
};
use tsi_capture_rs::acquisition::sink::{ExportFormat, TiffCompression, VideoCodec};
use tsi_capture_rs::acquisition::{
    ExportConfig, LiveConfig, StopSignal, describe_cameras, export, live_view,
};
use tsi_capture_rs::logger;

#[derive(Parser)]
#[command(name = "tsi-capture")]
#[command(about = "Frame acquisition for scientific cameras: video export and live view")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Where frames come from
#[derive(Args)]
struct SourceArgs {
    /// Replay RAW files from this directory as a camera
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,

    /// Sensor of the simulated camera, used without --raw-dir
    #[arg(long, global = true, value_enum, default_value_t = SimulatedSensor::Mono)]
    simulate: SimulatedSensor,

    #[arg(long, global = true, default_value = "640")]
    width: usize,

    #[arg(long, global = true, default_value = "480")]
    height: usize,

    #[arg(long, global = true, default_value = "12")]
    bit_depth: u32,

    /// Native frame rate of the simulated or replayed camera
    #[arg(long, global = true, default_value = "30")]
    source_rate: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Capture a fixed number of frames to a file
    Export {
        /// Number of frames to capture
        #[arg(short, long, default_value = "200")]
        frames: usize,

        /// Output file path (default: video.tif or video.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Codec for MP4 output
        #[arg(long, value_enum, default_value_t = CodecArg::Mp4v)]
        codec: CodecArg,

        /// Compression for TIFF output
        #[arg(long, value_enum, default_value_t = CompressionArg::None)]
        compression: CompressionArg,

        /// TIFF predictor (2 for horizontal differencing)
        #[arg(long)]
        predictor: Option<u16>,

        /// Frame rate override for the camera and the video file
        #[arg(long)]
        frame_rate: Option<f64>,

        /// Poll timeout in milliseconds; exceeding it aborts the export
        #[arg(long, default_value = "2000")]
        poll_timeout_ms: u64,
    },

    /// Show a normalized live view in the terminal
    Live {
        #[arg(long, default_value = "1000")]
        exposure_us: u32,

        #[arg(long, default_value = "10")]
        frame_rate: f64,

        /// Poll timeout in milliseconds; empty polls are skipped
        #[arg(long, default_value = "1000")]
        poll_timeout_ms: u64,

        /// Log file, keeps log lines off the live display
        #[arg(long, default_value = "tsi-capture.log")]
        log_file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SimulatedSensor {
    Mono,
    Color,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Tiff,
    Mp4,
}

#[derive(Clone, Copy, ValueEnum)]
enum CodecArg {
    Mp4v,
    H264,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Lzw,
    DeflateFast,
    DeflateBalanced,
    DeflateBest,
}

impl From<CodecArg> for VideoCodec {
    fn from(codec: CodecArg) -> Self {
        match codec {
            CodecArg::Mp4v => VideoCodec::Mpeg4Part2,
            CodecArg::H264 => VideoCodec::H264,
        }
    }
}

impl From<CompressionArg> for TiffCompression {
    fn from(compression: CompressionArg) -> Self {
        match compression {
            CompressionArg::None => TiffCompression::None,
            CompressionArg::Lzw => TiffCompression::Lzw,
            CompressionArg::DeflateFast => TiffCompression::DeflateFast,
            CompressionArg::DeflateBalanced => TiffCompression::DeflateBalanced,
            CompressionArg::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

fn simulated_camera(source: &SourceArgs) -> SimulatedCameraConfig {
    let sensor_type = match source.simulate {
        SimulatedSensor::Mono => SensorType::Monochrome,
        SimulatedSensor::Color => SensorType::Bayer,
    };
    SimulatedCameraConfig::builder()
        .dimensions(source.width, source.height)
        .bit_depth(source.bit_depth)
        .frame_rate_hz(source.source_rate)
        .sensor_type(sensor_type)
        .build()
}

fn export_config(command: &Commands) -> Option<ExportConfig> {
    let Commands::Export {
        frames,
        output,
        format,
        codec,
        compression,
        predictor,
        frame_rate,
        poll_timeout_ms,
    } = command
    else {
        return None;
    };

    let mut builder = ExportConfig::builder()
        .frame_count(*frames)
        .compression((*compression).into())
        .predictor(*predictor)
        .frame_rate(*frame_rate)
        .poll_timeout(Duration::from_millis(*poll_timeout_ms));

    let format = format.map(|f| match f {
        FormatArg::Tiff => ExportFormat::TiffStack,
        FormatArg::Mp4 => ExportFormat::Mp4((*codec).into()),
    });
    if let Some(format) = format {
        builder = builder.format(format);
    }

    let mut config = builder.build();
    config.output = match output {
        Some(path) => path.clone(),
        None => match config.format {
            ExportFormat::TiffStack => PathBuf::from("video.tif"),
            ExportFormat::Mp4(_) => PathBuf::from("video.mp4"),
        },
    };
    Some(config)
}

fn run<S: CameraSdk>(sdk: S, command: &Commands, stop: &StopSignal) -> Result<()> {
    match command {
        Commands::List => {
            let cameras = describe_cameras(sdk).context("Failed to list cameras")?;
            if cameras.is_empty() {
                println!("No cameras detected");
            }
            for (index, camera) in cameras.iter().enumerate() {
                println!(
                    "{}: {} (serial {}) {}x{} {}-bit {} @ {:.1} fps",
                    index,
                    camera.model,
                    camera.serial,
                    camera.width,
                    camera.height,
                    camera.bit_depth,
                    camera.sensor_type,
                    camera.frame_rate_hz
                );
            }
        }
        Commands::Export { .. } => {
            let config = export_config(command).context("Missing export options")?;
            let summary = export(sdk, &config, stop)
                .with_context(|| format!("Export to {} failed", config.output.display()))?;
            println!(
                "Wrote {} frames to {}",
                summary.frames_delivered,
                config.output.display()
            );
        }
        Commands::Live {
            exposure_us,
            frame_rate,
            poll_timeout_ms,
            ..
        } => {
            let config = LiveConfig {
                exposure_time_us: *exposure_us,
                frame_rate: *frame_rate,
                poll_timeout: Duration::from_millis(*poll_timeout_ms),
                ..LiveConfig::default()
            };
            live_view(sdk, &config, stop).context("Live view failed")?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Live { log_file, .. } => logger::init_with_file(log_file)
            .with_context(|| format!("Cannot open log file {}", log_file.display()))?,
        _ => logger::init(),
    }

    info!("Starting tsi-capture...");

    let stop = StopSignal::new();
    stop.install_ctrlc_handler()
        .context("Failed to install Ctrl+C handler")?;

    let result = match &cli.source.raw_dir {
        Some(dir) => {
            info!(directory = %dir.display(), "Replaying RAW files");
            let sdk = RawReplaySdk::new(dir).with_frame_rate(cli.source.source_rate);
            run(sdk, &cli.command, &stop)
        }
        None => run(
            SimulatedSdk::new(vec![simulated_camera(&cli.source)]),
            &cli.command,
            &stop,
        ),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
