//! Host side of the compile protocol.
//!
//! The coordinator sends commands to a [`WorkerHandle`](crate::worker::WorkerHandle),
//! then loops on its events. File requests are answered in place from the
//! vault or the package resolver; the loop ends with the compile result.

mod coordinator;
mod error;

pub use coordinator::HostCoordinator;
pub use error::{HostError, HostResult};
