//! The sequential endpoint contract
//!
//! An endpoint is the byte source/sink a compression stream wraps: a file,
//! a pipe, an in-memory buffer. The contract is deliberately small:
//! forward reads and writes plus a push-back operation so a reader that
//! pulled more raw bytes than one logical stream needed can hand the
//! excess back for whoever reads the endpoint next.

use flowpack_types::{Direction, Result};

/// A strictly sequential byte source/sink
pub trait Endpoint {
    /// Open the endpoint for the given direction
    ///
    /// Fails if the endpoint is already open or cannot be opened for
    /// `direction`.
    fn open(&mut self, direction: Direction) -> Result<()>;

    /// Close the endpoint
    ///
    /// Safe to call on an endpoint that is not open.
    fn close(&mut self);

    /// Whether the endpoint is currently open
    fn is_open(&self) -> bool;

    /// The direction the endpoint is open for, if any
    fn open_direction(&self) -> Option<Direction>;

    /// Read up to `buf.len()` bytes into `buf`
    ///
    /// Returns the number of bytes read; 0 means the source is exhausted.
    /// Bytes previously handed back via [`push_back`](Self::push_back) are
    /// returned first, in order.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write up to `buf.len()` bytes from `buf`
    ///
    /// Returns the number of bytes accepted, which may be fewer than
    /// `buf.len()`; callers that need the whole buffer delivered must
    /// retry with the remainder.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Hand previously read bytes back to the endpoint
    ///
    /// The next read returns `bytes` first, in the given order, before any
    /// further bytes from the underlying source.
    fn push_back(&mut self, bytes: &[u8]);
}

impl<T: Endpoint + ?Sized> Endpoint for &mut T {
    fn open(&mut self, direction: Direction) -> Result<()> {
        (**self).open(direction)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn open_direction(&self) -> Option<Direction> {
        (**self).open_direction()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn push_back(&mut self, bytes: &[u8]) {
        (**self).push_back(bytes);
    }
}
