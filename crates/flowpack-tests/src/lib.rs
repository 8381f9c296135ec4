//! flowpack integration test suite
//!
//! This crate provides integration tests for the flowpack streaming
//! compression stack, together with the endpoint test doubles the tests
//! are built on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod test_utils;
