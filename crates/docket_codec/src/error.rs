//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or comparing index terms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The term is truncated and cannot be fully decoded; callers must fall
    /// back to a document recheck.
    #[error("term is truncated; full decode requires document recheck")]
    Truncated,

    /// The serialized term header or payload is malformed. Unrecoverable:
    /// indicates corruption or a codec version mismatch.
    #[error("corrupt index term: {message}")]
    CorruptTerm {
        /// Description of the corruption.
        message: String,
    },

    /// A type tag in a serialized term is not part of the value model.
    #[error("unsupported value type tag {tag:#04x}")]
    UnsupportedType {
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// Ascending and descending terms were compared against each other.
    #[error("cannot compare ascending and descending index terms")]
    MixedDirectionCompare,

    /// The textual debug form of a term could not be parsed.
    #[error("invalid debug term encoding: {message}")]
    InvalidDebugFormat {
        /// Description of the parse failure.
        message: String,
    },
}

impl CodecError {
    /// Creates a corrupt-term error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptTerm {
            message: message.into(),
        }
    }

    /// Creates an invalid-debug-format error.
    pub fn invalid_debug(message: impl Into<String>) -> Self {
        Self::InvalidDebugFormat {
            message: message.into(),
        }
    }
}
