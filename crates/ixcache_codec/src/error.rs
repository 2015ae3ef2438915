//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A string field did not contain valid UTF-8.
    #[error("invalid UTF-8 in field '{field}'")]
    InvalidUtf8 {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A boolean byte held something other than 0 or 1.
    #[error("invalid boolean byte {value:#04x}")]
    InvalidBool {
        /// The byte that was read.
        value: u8,
    },

    /// The encoded version is zero or newer than this build understands.
    #[error("unsupported version {version} for {type_name} (max supported {max})")]
    UnsupportedVersion {
        /// Type being decoded.
        type_name: &'static str,
        /// Version found on the wire.
        version: u16,
        /// Highest version this build can read.
        max: u16,
    },

    /// A message envelope carried a type tag no decoder is registered for.
    #[error("unknown type tag {tag}")]
    UnknownTypeTag {
        /// The tag found on the wire.
        tag: u8,
    },

    /// A decoder read past the end of its enclosing region.
    #[error("read past end of region while decoding {type_name}")]
    RegionOverrun {
        /// Type whose region was overrun.
        type_name: &'static str,
    },

    /// A value is too long for its length prefix.
    #[error("field '{field}' length {len} exceeds maximum {max}")]
    LengthOverflow {
        /// Name of the offending field.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum the prefix can express.
        max: usize,
    },

    /// A length prefix claims more data than allowed.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// Length claimed by the prefix.
        claimed: u64,
        /// Configured maximum.
        max_allowed: u64,
    },

    /// Structurally invalid input.
    #[error("malformed message: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl CodecError {
    /// Create a malformed message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create a length overflow error.
    pub fn length_overflow(field: &'static str, len: usize, max: usize) -> Self {
        Self::LengthOverflow { field, len, max }
    }

    /// Returns true if the error stems from a version or type tag this
    /// build cannot interpret, as opposed to corrupt bytes.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion { .. } | Self::UnknownTypeTag { .. }
        )
    }
}
