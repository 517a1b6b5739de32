//! Error types for the AiDb filter subsystem.

use thiserror::Error;

/// The result type used throughout the filter subsystem.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for filter operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Filter bytes carry a known marker but an inconsistent layout.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The filter marker is not understood by this version.
    ///
    /// Either the bytes are corrupt or they were written by a newer
    /// encoding. Callers must not treat the key as absent.
    #[error("Unsupported filter (marker {marker:#04x}): {detail}")]
    UnsupportedFilter {
        /// The primary marker byte found in the filter trailer.
        marker: u8,
        /// What about the trailer was not understood.
        detail: String,
    },

    /// A configuration could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new unsupported filter error.
    pub fn unsupported_filter(marker: u8, detail: impl Into<String>) -> Self {
        Error::UnsupportedFilter { marker, detail: detail.into() }
    }

    /// Returns true if this error came from decoding filter bytes.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::UnsupportedFilter { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("test corruption");
        assert_eq!(err.to_string(), "Data corruption: test corruption");

        let err = Error::unsupported_filter(0xff, "unknown sub-implementation 7");
        assert!(err.to_string().contains("0xff"));
        assert!(err.to_string().contains("sub-implementation 7"));
    }

    #[test]
    fn test_decode_error_classification() {
        assert!(Error::corruption("x").is_decode_error());
        assert!(Error::unsupported_filter(0, "x").is_decode_error());
        assert!(!Error::invalid_argument("x").is_decode_error());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
