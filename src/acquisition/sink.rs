//! Frame sinks
//!
//! Destinations for processed frames: file writers for export and a terminal
//! canvas for live viewing.

mod frame_sink;
mod tiff_stack;
#[cfg(feature = "mp4")]
mod mp4;
pub mod colormap;
mod terminal;
pub mod types;

pub use frame_sink::{FrameSink, SinkSpec, prepare_output_path};
pub use tiff_stack::TiffStackWriter;
#[cfg(feature = "mp4")]
pub use mp4::Mp4Writer;
pub use terminal::TerminalDisplay;
pub use types::{ExportFormat, TiffCompression, VideoCodec};
