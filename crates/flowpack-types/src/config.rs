//! Configuration types for flowpack
//!
//! Validated configuration newtypes. Backends treat the buffer size as a
//! hint and may raise it to their codec's recommended chunk size.

/// Scratch buffer size hint with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferSize(usize);

impl BufferSize {
    /// Minimum buffer size (1KB)
    pub const MIN: usize = 1024;
    /// Maximum buffer size (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Default buffer size (64KB)
    pub const DEFAULT: usize = 64 * 1024;

    /// Create a new buffer size with validation
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Buffer size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Buffer size {} exceeds maximum {}", size, Self::MAX))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the buffer size value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}
