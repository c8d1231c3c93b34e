//! Sink configuration types

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - balanced (default)
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

/// Video codec used by the MP4 writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// MPEG-4 Part 2, fourcc `mp4v`
    Mpeg4Part2,
    H264,
}

impl VideoCodec {
    pub fn fourcc(self) -> &'static str {
        match self {
            VideoCodec::Mpeg4Part2 => "mp4v",
            VideoCodec::H264 => "avc1",
        }
    }
}

/// Container written by an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Multi-page TIFF, one page per frame
    TiffStack,
    Mp4(VideoCodec),
}
