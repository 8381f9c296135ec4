//! Endpoint test doubles and payload builders
//!
//! Utilities shared by the integration tests: an endpoint that transfers
//! only a few bytes per call (to exercise short-write retries and
//! small-refill reads) and deterministic payload generators.

use flowpack_io::{Endpoint, MemoryEndpoint};
use flowpack_types::{Direction, Result};

/// An endpoint that moves at most `max_chunk` bytes per read or write call
///
/// Wraps a [`MemoryEndpoint`]; useful for verifying that the compression
/// layer retries short writes until everything is delivered and that
/// decompression copes with arbitrarily small refills.
#[derive(Debug)]
pub struct TrickleEndpoint {
    inner: MemoryEndpoint,
    max_chunk: usize,
}

impl TrickleEndpoint {
    /// Create an empty trickling endpoint
    pub fn new(max_chunk: usize) -> Self {
        Self {
            inner: MemoryEndpoint::new(),
            max_chunk,
        }
    }

    /// Create a trickling endpoint seeded with bytes to read
    pub fn from_bytes(bytes: impl AsRef<[u8]>, max_chunk: usize) -> Self {
        Self {
            inner: MemoryEndpoint::from_bytes(bytes),
            max_chunk,
        }
    }

    /// All bytes held by the wrapped endpoint
    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }
}

impl Endpoint for TrickleEndpoint {
    fn open(&mut self, direction: Direction) -> Result<()> {
        self.inner.open(direction)
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn open_direction(&self) -> Option<Direction> {
        self.inner.open_direction()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let cap = buf.len().min(self.max_chunk);
        self.inner.read(&mut buf[..cap])
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let cap = buf.len().min(self.max_chunk);
        self.inner.write(&buf[..cap])
    }

    fn push_back(&mut self, bytes: &[u8]) {
        self.inner.push_back(bytes);
    }
}

/// Deterministic mixed-entropy payload of the given size
pub fn mixed_payload(size: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(size);
    let mut state = 0x2545_f491u32;
    for i in 0..size {
        if i % 3 == 0 {
            payload.push(b'a' + (i % 26) as u8);
        } else {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            payload.push((state >> 24) as u8);
        }
    }
    payload
}
