//! Host-side error types.

use thiserror::Error;

use crate::config::SettingsError;
use crate::package::PackageError;
use crate::protocol::CompileFailure;
use crate::worker::WorkerError;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

#[derive(Error, Debug)]
pub enum HostError {
    /// The worker reported a failed compile.
    #[error("compile failed: {message}")]
    Compile { message: String, code: Option<i32> },

    /// The compiler could not be initialized.
    #[error("worker startup failed: {0}")]
    Startup(String),

    /// The worker stopped before answering.
    #[error("worker exited")]
    WorkerExited,

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl From<CompileFailure> for HostError {
    fn from(failure: CompileFailure) -> Self {
        Self::Compile {
            message: failure.message,
            code: failure.code,
        }
    }
}
