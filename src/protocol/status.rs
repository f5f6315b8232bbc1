//! Status codes carried in the control word of a [`SharedBuffer`].
//!
//! [`SharedBuffer`]: super::SharedBuffer

use thiserror::Error;

/// Control word value of a buffer nobody has answered yet.
pub const STATUS_PENDING: i32 = -1;

/// Control word value of a successful response.
pub const STATUS_SUCCESS: i32 = 0;

/// Failure outcome of a single file read.
///
/// The numeric codes are part of the wire format and must not change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadError {
    /// Unknown or internal failure (code 1).
    #[error("internal failure while reading file")]
    Generic,

    /// The file or package does not exist (code 2).
    #[error("file not found")]
    NotFound,

    /// Fetching the resource over the network failed (code 3).
    #[error("transport failure while fetching file")]
    Transport,
}

impl ReadError {
    /// The wire code written into the control word.
    pub fn code(self) -> i32 {
        match self {
            Self::Generic => 1,
            Self::NotFound => 2,
            Self::Transport => 3,
        }
    }

    /// Map a nonzero control word back to an error.
    ///
    /// Unknown codes collapse to [`ReadError::Generic`]. Passing
    /// [`STATUS_SUCCESS`] is a caller bug and is treated the same way.
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Self::NotFound,
            3 => Self::Transport,
            _ => Self::Generic,
        }
    }
}

/// Decoded state of a control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Success,
    Failed(ReadError),
}

impl Status {
    pub fn from_word(word: i32) -> Self {
        match word {
            STATUS_PENDING => Self::Pending,
            STATUS_SUCCESS => Self::Success,
            code => Self::Failed(ReadError::from_code(code)),
        }
    }

    pub fn to_word(self) -> i32 {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::Success => STATUS_SUCCESS,
            Self::Failed(err) => err.code(),
        }
    }
}
