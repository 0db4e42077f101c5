//! Error types for LIF operations

use thiserror::Error;

/// Main error type for LIF operations
#[derive(Error, Debug)]
pub enum LifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid LIF format: {0}")]
    InvalidFormat(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("metadata/data mismatch: {0}")]
    Inconsistent(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),
}

/// Specialized Result type for LIF operations
pub type Result<T> = std::result::Result<T, LifError>;

impl From<quick_xml::Error> for LifError {
    fn from(err: quick_xml::Error) -> Self {
        LifError::Xml(err.to_string())
    }
}

impl From<std::num::ParseIntError> for LifError {
    fn from(err: std::num::ParseIntError) -> Self {
        LifError::InvalidFormat(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for LifError {
    fn from(err: std::num::ParseFloatError) -> Self {
        LifError::InvalidFormat(err.to_string())
    }
}
