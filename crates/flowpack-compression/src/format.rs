//! Stream format configuration
//!
//! A [`FormatSpec`] selects which codec backend a stream uses, the
//! container framing for DEFLATE streams, and the compression level. It is
//! validated at construction and immutable afterwards.

use flowpack_types::{CodecKind, ContainerFormat, Error, Result};

/// Maximum DEFLATE compression level (level 0 stores without compressing)
pub const DEFLATE_MAX_LEVEL: u32 = 9;

/// Codec, container framing, and compression level for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatSpec {
    kind: CodecKind,
    container: ContainerFormat,
    level: i32,
}

impl FormatSpec {
    /// A DEFLATE-family stream with the given container framing
    ///
    /// `level` 0 stores without compressing, 9 compresses hardest; values
    /// above 9 are rejected.
    pub fn deflate(container: ContainerFormat, level: u32) -> Result<Self> {
        if level > DEFLATE_MAX_LEVEL {
            return Err(Error::config(format!(
                "deflate compression level {} exceeds maximum {}",
                level, DEFLATE_MAX_LEVEL
            )));
        }
        Ok(Self {
            kind: CodecKind::Deflate,
            container,
            level: level as i32,
        })
    }

    /// A bare DEFLATE stream with no header or trailer
    pub fn raw_deflate(level: u32) -> Result<Self> {
        Self::deflate(ContainerFormat::Raw, level)
    }

    /// A zlib-wrapped DEFLATE stream (RFC 1950)
    pub fn zlib(level: u32) -> Result<Self> {
        Self::deflate(ContainerFormat::Zlib, level)
    }

    /// A gzip-wrapped DEFLATE stream (RFC 1952)
    pub fn gzip(level: u32) -> Result<Self> {
        Self::deflate(ContainerFormat::Gzip, level)
    }

    /// A frame-streaming (zstd) stream
    ///
    /// The level is validated against the codec's supported range. In a
    /// build without the `zstd` feature any level is accepted here and
    /// `open()` fails with a descriptive error instead.
    pub fn frame_streaming(level: i32) -> Result<Self> {
        #[cfg(feature = "zstd")]
        {
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(Error::config(format!(
                    "frame-streaming compression level {} is outside the supported range {}..={}",
                    level,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(Self {
            kind: CodecKind::FrameStreaming,
            container: ContainerFormat::Raw,
            level,
        })
    }

    /// Which codec family this spec selects
    pub fn codec(&self) -> CodecKind {
        self.kind
    }

    /// The container framing (meaningful for DEFLATE streams only)
    pub fn container(&self) -> ContainerFormat {
        self.container
    }

    /// The compression level
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for FormatSpec {
    /// zlib framing at level 6, the smallest-overhead DEFLATE default
    fn default() -> Self {
        Self {
            kind: CodecKind::Deflate,
            container: ContainerFormat::Zlib,
            level: 6,
        }
    }
}
