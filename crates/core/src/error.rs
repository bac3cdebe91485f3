//! Error types for the dump.cs scanner

use thiserror::Error;

/// Main error type for the scanner
///
/// Structural problems inside a dump never surface here; they degrade to
/// skipped records and [`crate::ScanEvent`] diagnostics. This type covers the
/// edges: file access, configuration, and caller-facing parsing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid offset: {0:?}")]
    InvalidOffset(String),

    #[error("{0}")]
    Custom(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_offset(offset: impl Into<String>) -> Self {
        Self::InvalidOffset(offset.into())
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}
