//! Error types for Docket core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during term generation and bounds computation.
///
/// Data-shape problems (oversized values, ambiguous multi-key layouts) never
/// surface here; they are absorbed into recheck obligations so writes and
/// reads stay correct-but-slower. Only invariant violations reach the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Term codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docket_codec::CodecError),

    /// A composite index definition failed validation.
    #[error("invalid index spec: {message}")]
    InvalidIndexSpec {
        /// Description of the validation failure.
        message: String,
    },

    /// A query constraint names a path the index does not cover.
    #[error("path {path:?} is not part of the index")]
    UnboundPath {
        /// The unmatched query path.
        path: String,
    },
}

impl CoreError {
    /// Creates an invalid-index-spec error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidIndexSpec {
            message: message.into(),
        }
    }

    /// Creates an unbound-path error.
    pub fn unbound_path(path: impl Into<String>) -> Self {
        Self::UnboundPath { path: path.into() }
    }
}
