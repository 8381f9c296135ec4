//! In-memory endpoint
//!
//! Backs a stream session with a growable byte buffer. Useful for tests
//! and for compressing into (or decompressing out of) memory without
//! touching the filesystem.

use bytes::BytesMut;
use flowpack_types::{Direction, Error, Result};
use tracing::debug;

/// An in-memory sequential endpoint
///
/// Reads consume the buffer front to back; writes append to the end.
/// Bytes handed back via `push_back` are served before the remaining
/// buffer contents and survive close/reopen, so a second session over the
/// same endpoint starts exactly where the first logical stream ended.
#[derive(Debug, Default)]
pub struct MemoryEndpoint {
    data: BytesMut,
    read_pos: usize,
    pending: Vec<u8>,
    direction: Option<Direction>,
}

impl MemoryEndpoint {
    /// Create an empty endpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint seeded with bytes to read
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            data: BytesMut::from(bytes.as_ref()),
            read_pos: 0,
            pending: Vec::new(),
            direction: None,
        }
    }

    /// All bytes held by the endpoint, written or seeded
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes still readable (pushed-back bytes included)
    pub fn remaining(&self) -> usize {
        self.pending.len() + (self.data.len() - self.read_pos)
    }
}

impl super::Endpoint for MemoryEndpoint {
    fn open(&mut self, direction: Direction) -> Result<()> {
        if self.direction.is_some() {
            return Err(Error::endpoint("memory endpoint is already open"));
        }
        debug!("Opened memory endpoint for {:?}", direction);
        self.direction = Some(direction);
        Ok(())
    }

    fn close(&mut self) {
        self.direction = None;
    }

    fn is_open(&self) -> bool {
        self.direction.is_some()
    }

    fn open_direction(&self) -> Option<Direction> {
        self.direction
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.direction != Some(Direction::Read) {
            return Err(Error::endpoint("memory endpoint is not open for reading"));
        }

        let mut copied = 0;

        // Pushed-back bytes first.
        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            copied = n;
        }

        let available = self.data.len() - self.read_pos;
        let n = available.min(buf.len() - copied);
        buf[copied..copied + n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;

        Ok(copied + n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.direction != Some(Direction::Write) {
            return Err(Error::endpoint("memory endpoint is not open for writing"));
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn push_back(&mut self, bytes: &[u8]) {
        self.pending.splice(0..0, bytes.iter().copied());
    }
}
