//! Error types for the conversion pipeline.
//!
//! Every fatal condition surfaces as a [`ConvertError`]. Best-effort file
//! operations (solution relocation, info-file propagation) never produce an
//! error; they report through [`crate::export::FileOutcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Fatal conversion errors.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Invalid or incomplete configuration (partial shape, sparse + sequence,
    /// unsupported split kind, unknown task kind in strict mode, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Declared tensor shape disagrees with the observed feature width.
    #[error(
        "incompatible metadata with data shape: (sequence_size, row_count, col_count, num_channels) = {shape:?} \
         has {declared} entries but got num_features = {observed}"
    )]
    ShapeMismatch {
        shape: (usize, usize, usize, usize),
        declared: usize,
        observed: usize,
    },

    /// Matrices that must correspond row-for-row or column-for-column do not.
    #[error("inconsistent data: {0}")]
    InconsistentData(String),

    /// A required source file does not exist.
    #[error("required file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A source file could not be parsed.
    #[error("failed to parse {}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Config or report (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record file failed CRC or wire-format checks on read.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Shorthand for [`ConvertError::Configuration`].
    pub fn config(message: impl Into<String>) -> Self {
        ConvertError::Configuration(message.into())
    }

    /// Whether this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConvertError::Configuration(_))
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(e: toml::de::Error) -> Self {
        ConvertError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for ConvertError {
    fn from(e: toml::ser::Error) -> Self {
        ConvertError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(e: serde_json::Error) -> Self {
        ConvertError::Serialization(e.to_string())
    }
}
