//! Error types and handling for flowpack
//!
//! This module provides the error taxonomy for the streaming compression
//! stack: configuration mistakes surfaced at open time, endpoint I/O
//! failures, and codec failures. "Need more input right now" is never an
//! error value anywhere in flowpack; operations report it as `Ok(0)`.

/// Main error type for flowpack operations
#[derive(thiserror::Error, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Invalid configuration or misuse of the stream lifecycle
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// I/O failure reported by the underlying endpoint
    #[error("Endpoint error: {message}")]
    Endpoint {
        /// Error message, carrying the endpoint's own description
        message: String,
    },

    /// Corrupt or truncated compressed data, or a codec-internal failure
    #[error("Codec error: {message}")]
    Codec {
        /// Error message describing the codec failure
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration and lifecycle-misuse errors
    Config,
    /// Endpoint I/O errors
    Endpoint,
    /// Codec errors
    Codec,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Endpoint { .. } => ErrorKind::Endpoint,
            Self::Codec { .. } => ErrorKind::Codec,
        }
    }

    /// The bare message, without the kind prefix added by `Display`
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message } | Self::Endpoint { message } | Self::Codec { message } => {
                message
            }
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new endpoint error
    pub fn endpoint<S: Into<String>>(message: S) -> Self {
        Self::Endpoint {
            message: message.into(),
        }
    }

    /// Create a new codec error
    pub fn codec<S: Into<String>>(message: S) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Endpoint {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_error_kind_consistency(message in ".*") {
            let errors = vec![
                Error::Config { message: message.clone() },
                Error::Endpoint { message: message.clone() },
                Error::Codec { message: message.clone() },
            ];

            for error in errors {
                match error {
                    Error::Config { .. } => prop_assert_eq!(error.kind(), ErrorKind::Config),
                    Error::Endpoint { .. } => prop_assert_eq!(error.kind(), ErrorKind::Endpoint),
                    Error::Codec { .. } => prop_assert_eq!(error.kind(), ErrorKind::Codec),
                }
            }
        }

        #[test]
        fn test_error_message_preserved(message in "[a-zA-Z0-9 ]+") {
            let error = Error::codec(message.clone());
            prop_assert!(error.to_string().contains(&message));
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error = Error::from(io_error);

        assert_eq!(error.kind(), ErrorKind::Endpoint);
        assert!(error.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_constructor_helpers() {
        assert_eq!(Error::config("x").kind(), ErrorKind::Config);
        assert_eq!(Error::endpoint("x").kind(), ErrorKind::Endpoint);
        assert_eq!(Error::codec("x").kind(), ErrorKind::Codec);
    }
}
