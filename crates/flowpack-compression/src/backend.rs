//! Codec backend dispatch
//!
//! The backends form a closed set of tagged variants rather than a trait
//! hierarchy: the "unsupported in this build" case is an ordinary variant
//! state, and dispatch stays a plain `match`.

use flowpack_io::Endpoint;
use flowpack_types::{BufferSize, CodecKind, Direction, Error, Result, StreamState};

use crate::deflate::DeflateBackend;
use crate::format::FormatSpec;
use crate::frame::FrameBackend;

/// A codec backend bound to one open stream session
pub(crate) enum Backend {
    Deflate(DeflateBackend),
    Frame(FrameBackend),
}

impl Backend {
    /// Create the backend variant selected by `spec`
    pub(crate) fn new(spec: &FormatSpec, buffer_size: BufferSize) -> Self {
        match spec.codec() {
            CodecKind::Deflate => Self::Deflate(DeflateBackend::new(
                spec.container(),
                spec.level() as u32,
                buffer_size,
            )),
            CodecKind::FrameStreaming => Self::Frame(FrameBackend::new(spec.level(), buffer_size)),
        }
    }

    /// Allocate codec state and the scratch buffer for `direction`
    pub(crate) fn initialize(&mut self, direction: Direction) -> Result<()> {
        match self {
            Self::Deflate(backend) => backend.initialize(direction),
            Self::Frame(backend) => backend.initialize(direction),
        }
    }

    /// Decompress up to `out.len()` bytes from the endpoint into `out`
    pub(crate) fn read<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        out: &mut [u8],
    ) -> Result<usize> {
        match self {
            Self::Deflate(backend) => backend.read(endpoint, out),
            Self::Frame(backend) => backend.read(endpoint, out),
        }
    }

    /// Compress all of `data` to the endpoint
    pub(crate) fn write<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        data: &[u8],
    ) -> Result<usize> {
        match self {
            Self::Deflate(backend) => backend.write(endpoint, data),
            Self::Frame(backend) => backend.write(endpoint, data),
        }
    }

    /// Sync-flush buffered compressed bytes without ending the stream
    pub(crate) fn flush<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> Result<()> {
        match self {
            Self::Deflate(backend) => backend.flush(endpoint),
            Self::Frame(backend) => backend.flush(endpoint),
        }
    }

    /// Tear down the session, draining pending output in Write direction
    pub(crate) fn finalize<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        direction: Direction,
    ) -> Result<()> {
        match self {
            Self::Deflate(backend) => backend.finalize(endpoint, direction),
            Self::Frame(backend) => backend.finalize(endpoint, direction),
        }
    }

    /// Current lifecycle state
    pub(crate) fn state(&self) -> StreamState {
        match self {
            Self::Deflate(backend) => backend.state(),
            Self::Frame(backend) => backend.state(),
        }
    }
}

/// Write the whole of `buf` to the endpoint, retrying short writes
pub(crate) fn write_all<E: Endpoint + ?Sized>(endpoint: &mut E, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let written = endpoint.write(buf).map_err(|e| {
            Error::endpoint(format!(
                "error writing to underlying endpoint: {}",
                e.message()
            ))
        })?;
        if written == 0 {
            return Err(Error::endpoint(
                "underlying endpoint accepted no bytes while writing",
            ));
        }
        buf = &buf[written..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpack_io::MemoryEndpoint;

    #[test]
    fn test_write_all_delivers_everything() {
        let mut endpoint = MemoryEndpoint::new();
        endpoint.open(Direction::Write).unwrap();
        write_all(&mut endpoint, b"all of these bytes").unwrap();
        assert_eq!(endpoint.as_slice(), b"all of these bytes");
    }

    #[test]
    fn test_write_all_on_closed_endpoint_fails() {
        let mut endpoint = MemoryEndpoint::new();
        let err = write_all(&mut endpoint, b"data").unwrap_err();
        assert!(err.to_string().contains("underlying endpoint"));
    }
}
