//! Package resolution errors.

use std::io;

use thiserror::Error;

use super::spec::{PackageSpec, SpecError};
use crate::protocol::ReadError;

/// Result type for package operations.
pub type PackageResult<T> = Result<T, PackageError>;

#[derive(Error, Debug)]
pub enum PackageError {
    /// No source can satisfy the package.
    #[error("package not found: {0}")]
    NotFound(PackageSpec),

    /// The registry could not be reached or answered with an error.
    #[error("failed to download {spec}: {message}")]
    Transport { spec: PackageSpec, message: String },

    /// The downloaded archive is not a readable `.tar.gz`.
    #[error("invalid package archive: {0}")]
    Archive(String),

    /// The HTTP client could not be set up.
    #[error("http client error: {0}")]
    Http(String),

    /// Writing the unpacked package failed.
    #[error("package storage error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl PackageError {
    /// Map to the read error reported back to the engine.
    pub fn read_error(&self) -> ReadError {
        match self {
            Self::NotFound(_) | Self::Spec(_) => ReadError::NotFound,
            Self::Transport { .. } | Self::Archive(_) | Self::Http(_) => ReadError::Transport,
            Self::Io(_) => ReadError::Generic,
        }
    }

    /// Numeric status code written to the shared buffer.
    pub fn status_code(&self) -> i32 {
        self.read_error().code()
    }
}
