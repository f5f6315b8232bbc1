//! # typst-bridge
//!
//! Host/worker plumbing for compiling Typst documents inside a note vault.
//!
//! ## Architecture
//!
//! The compiler engine runs on its own thread and expects synchronous file
//! access. Every read is turned into a request to the host, which resolves
//! it asynchronously and wakes the worker through a shared buffer:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  HostCoordinator                        │
//! │   startup / fonts / compile      handle_request         │
//! └─────────────────────────────────────────────────────────┘
//!        │ WorkerCommand                    ▲ FileRequest
//!        ▼                                  │ (SharedBuffer)
//! ┌─────────────────────────────────────────────────────────┐
//! │            Dispatcher (worker thread)                   │
//! │   Engine ── FileResolver::read ── blocks on buffer      │
//! └─────────────────────────────────────────────────────────┘
//!                                           │
//!                                           ▼ @ns/name/version
//! ┌─────────────────────────────────────────────────────────┐
//! │                 PackageResolver                         │
//! │   system dirs ─▶ vault storage ─▶ registry download     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod editing;
pub mod fonts;
pub mod host;
pub mod package;
pub mod protocol;
pub mod template;
pub mod vfs;
pub mod worker;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::host::{HostCoordinator, HostError, HostResult};
    pub use crate::package::{PackageError, PackageResolver, PackageSpec};
    pub use crate::protocol::{
        CompileOutput, CompileRequest, FileRequest, ReadError, SharedBuffer, WorkerCommand,
        WorkerEvent,
    };
    pub use crate::vfs::{LocalFs, VirtualFs};
    pub use crate::worker::{Engine, EngineLoader, FileResolver, WorkerHandle};
}
