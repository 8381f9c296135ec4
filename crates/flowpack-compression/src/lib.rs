//! Streaming compression adapter for flowpack
//!
//! This crate provides a transparent compression/decompression layer over a
//! sequential byte endpoint. It includes:
//!
//! - **`CompressorStream`**: the stream facade; bytes written to it are
//!   compressed before reaching the endpoint, bytes read from it are
//!   decompressed as they arrive
//! - **Dual-codec backends**: a DEFLATE-family backend with raw, zlib, and
//!   gzip container framing, and a frame-streaming (zstd) backend
//! - **Lifecycle management**: direction-fixed sessions with a state
//!   machine governing flush and finalize behavior
//!
//! # Features
//!
//! - `zstd` (default): Enable the frame-streaming backend. Without it the
//!   backend degrades to a stub that fails fast with a descriptive error,
//!   leaving the public contract unchanged.
//! - `serde`: Enable serialization support for format configuration
//!
//! # Examples
//!
//! ```rust
//! use flowpack_compression::{CompressorStream, FormatSpec};
//! use flowpack_io::MemoryEndpoint;
//! use flowpack_types::Direction;
//!
//! # fn main() -> flowpack_types::Result<()> {
//! let spec = FormatSpec::gzip(6)?;
//! let mut stream = CompressorStream::new(MemoryEndpoint::new(), spec);
//! stream.open(Direction::Write)?;
//! stream.write(b"The quick brown fox")?;
//! stream.close();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod format;
pub mod stream;

mod backend;
mod deflate;
mod frame;

// Re-export main types
pub use format::FormatSpec;
pub use stream::CompressorStream;
