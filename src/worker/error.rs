//! Worker-specific error types.

use std::io;
use std::sync::mpsc;

use thiserror::Error;

use crate::protocol::{CompileFailure, ReadError, WorkerCommand};

/// Result type for worker handle operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while talking to a worker thread.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[source] io::Error),

    /// The worker thread stopped receiving commands.
    #[error("worker thread exited unexpectedly")]
    WorkerExited,
}

impl From<mpsc::SendError<WorkerCommand>> for WorkerError {
    fn from(_: mpsc::SendError<WorkerCommand>) -> Self {
        Self::WorkerExited
    }
}

/// Errors raised by an engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A file read issued during compilation failed.
    #[error("failed to read file: {0}")]
    Read(#[from] ReadError),

    /// The document did not compile.
    #[error("{0}")]
    Compile(String),

    /// The compiler binary could not be loaded.
    #[error("failed to load compiler: {0}")]
    Load(String),
}

impl EngineError {
    /// Numeric read code carried by this error, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Read(err) => Some(err.code()),
            _ => None,
        }
    }
}

impl From<EngineError> for CompileFailure {
    fn from(err: EngineError) -> Self {
        Self {
            message: err.to_string(),
            code: err.code(),
        }
    }
}
