//! Result type alias for flowpack operations

/// Result type used throughout flowpack
pub type Result<T> = std::result::Result<T, crate::Error>;
