//! Error types for pastry-id.

use thiserror::Error;

use crate::space::IdSpace;

/// Result type for identifier operations.
pub type Result<T> = std::result::Result<T, IdError>;

/// Errors raised while constructing identifiers or identifier spaces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Wrong number of digits for the space.
    #[error("invalid node id: expected {expected} digits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A digit is outside `[0, base)`.
    #[error("invalid node id: digit {digit} at position {position} is out of range for base {base}")]
    InvalidDigit { position: usize, digit: u32, base: u8 },

    /// A character that is not a hex digit.
    #[error("invalid node id: {character:?} at position {position} is not a hex digit")]
    InvalidCharacter { position: usize, character: char },

    /// An identifier from a different ring than the one expected.
    #[error("invalid node id: belongs to space {actual}, expected {expected}")]
    SpaceMismatch { expected: IdSpace, actual: IdSpace },

    /// The base/length pair does not describe a usable ring.
    #[error("invalid id space: {0}")]
    InvalidSpace(String),
}
