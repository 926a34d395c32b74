//! Error types for MetaIO decoding

use thiserror::Error;

/// Structural defects in a MetaIO header
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeaderError {
    /// A non-empty line without exactly one `=` separator (0-based line index)
    #[error("Malformed header line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("Invalid number for {key}: {token:?}")]
    InvalidNumber { key: String, token: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Unsupported element type: {0}")]
    UnsupportedElementType(String),

    #[error("Invalid {key}: {reason}")]
    InvalidDimensions { key: String, reason: String },

    #[error("Compressed MetaIO data is not supported")]
    CompressedDataUnsupported,
}

/// Mismatches between the declared volume and its raw payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Volume is empty")]
    EmptyVolume,

    #[error("Invalid sampling options: {0}")]
    InvalidOptions(String),
}

/// Error returned by the composed decode and load operations
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The blocking sampling task panicked or was cancelled
    #[error("Sampling task failed: {0}")]
    Task(String),
}

/// Specialized Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DecodeError {
    fn from(err: tokio::task::JoinError) -> Self {
        DecodeError::Task(err.to_string())
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for DecodeError {
    fn from(err: reqwest::Error) -> Self {
        DecodeError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_error_wraps_into_decode_error() {
        let err: DecodeError = HeaderError::MissingKey("DimSize".to_string()).into();
        assert!(matches!(
            err,
            DecodeError::Header(HeaderError::MissingKey(ref key)) if key == "DimSize"
        ));
        assert_eq!(err.to_string(), "Missing required key: DimSize");
    }

    #[test]
    fn test_io_error_passes_through() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "d.raw");
        let err: DecodeError = io.into();
        match err {
            DecodeError::Io(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_error_is_a_task_failure() {
        let join_err = tokio::task::spawn_blocking(|| panic!("sampler panicked"))
            .await
            .unwrap_err();
        let err: DecodeError = join_err.into();
        assert!(matches!(err, DecodeError::Task(_)));
        assert!(err.to_string().starts_with("Sampling task failed"));
    }
}
