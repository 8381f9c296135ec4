//! Core type system and error handling for flowpack
//!
//! This crate provides the foundational types shared by the flowpack
//! streaming-compression stack. It includes:
//!
//! - **Error handling**: Structured error types with kinds and constructor helpers
//! - **Stream vocabulary**: Direction, lifecycle state, codec and framing selectors
//! - **Configuration**: Type-safe buffer sizing with validation
//!
//! # Features
//!
//! - `serde`: Enable serialization support for configuration and selector types
//!
//! # Examples
//!
//! ```rust
//! use flowpack_types::{BufferSize, Direction, Error, Result};
//!
//! fn open_session(direction: Direction) -> Result<BufferSize> {
//!     if direction == Direction::Read {
//!         Ok(BufferSize::default())
//!     } else {
//!         Err(Error::config("write sessions need an explicit buffer size"))
//!     }
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::BufferSize;
pub use error::{Error, ErrorKind};
pub use result::Result;
pub use types::{CodecKind, ContainerFormat, Direction, StreamState};
