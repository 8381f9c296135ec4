//! Core stream vocabulary for flowpack
//!
//! Direction, lifecycle state, and the codec/framing selectors shared by
//! the endpoint and compression crates.

/// Transfer direction of an open stream session
///
/// Fixed for the lifetime of a session; a stream is never open for both
/// directions at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Bytes flow from the endpoint to the caller, decompressed on the way
    Read,
    /// Bytes flow from the caller to the endpoint, compressed on the way
    Write,
}

/// Lifecycle state of a stream session
///
/// Read sessions move through `AwaitingFirstByte -> InStream ->
/// EndOfStream`; write sessions toggle between `NoBytesWritten` and
/// `BytesWritten` so that finalization knows whether a finish-drain is
/// required. `Error` is terminal until the stream is closed and reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamState {
    /// No session is open
    Closed,
    /// Read session opened, nothing pulled from the endpoint yet
    AwaitingFirstByte,
    /// Read session has consumed at least one raw byte
    InStream,
    /// The logical compressed stream has ended
    EndOfStream,
    /// Write session opened, nothing handed to the codec yet
    NoBytesWritten,
    /// Write session has produced output that must be flushed on close
    BytesWritten,
    /// A fatal error occurred; the session must be closed and reopened
    Error,
}

impl StreamState {
    /// The state a freshly initialized session starts in
    pub fn initial_for(direction: Direction) -> Self {
        match direction {
            Direction::Read => Self::AwaitingFirstByte,
            Direction::Write => Self::NoBytesWritten,
        }
    }

    /// Whether this state belongs to the read-direction state space
    pub fn is_read_state(self) -> bool {
        matches!(
            self,
            Self::AwaitingFirstByte | Self::InStream | Self::EndOfStream
        )
    }

    /// Whether this state belongs to the write-direction state space
    pub fn is_write_state(self) -> bool {
        matches!(self, Self::NoBytesWritten | Self::BytesWritten)
    }
}

/// Which codec family a stream uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecKind {
    /// DEFLATE-family codec with selectable container framing
    Deflate,
    /// Frame-oriented streaming codec (zstd)
    FrameStreaming,
}

/// Container framing around a DEFLATE stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContainerFormat {
    /// Bare DEFLATE bytes, no header or trailer
    Raw,
    /// zlib header and Adler-32 trailer (RFC 1950)
    Zlib,
    /// gzip header and CRC-32 + length trailer (RFC 1952)
    Gzip,
}
