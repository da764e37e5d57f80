//! Library error types.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::group::GroupError;

/// Result type used by every library operation.
pub type SortResult<T> = Result<T, SortError>;

/// Sorting library error.
#[derive(Debug)]
pub enum SortError {
    /// A key or record type layout failed the contiguity check.
    InvalidLayout,
    /// A declared count or range does not match a buffer length.
    SizeMismatch {
        /// Expected size.
        expected: usize,
        /// Size actually provided.
        actual: usize,
    },
    /// Merge requires at least two input sequences.
    TooFewInputs(usize),
    /// Process group communication error.
    Group(GroupError),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Group(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::InvalidLayout => write!(f, "key or record type layout is not contiguous"),
            SortError::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {}, got {}", expected, actual)
            }
            SortError::TooFewInputs(num) => {
                write!(f, "merge requires at least 2 input sequences, got {}", num)
            }
            SortError::Group(err) => write!(f, "process group communication failed: {}", err),
        }
    }
}

impl From<GroupError> for SortError {
    fn from(err: GroupError) -> Self {
        SortError::Group(err)
    }
}
