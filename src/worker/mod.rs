//! Compiler worker.
//!
//! The worker hosts the engine on a dedicated OS thread. The engine expects a
//! blocking file API; the worker provides it by parking the thread on a
//! [`SharedBuffer`](crate::protocol::SharedBuffer) until the host coordinator
//! answers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Host (tokio task)                            │
//! │   WorkerHandle ── WorkerCommand (std mpsc) ──────────┐          │
//! │        ▲                                             │          │
//! │        └──── WorkerEvent (tokio unbounded) ◀──┐      │          │
//! └───────────────────────────────────────────────┼──────┼──────────┘
//!                                                 │      ▼
//! ┌───────────────────────────────────────────────┼─────────────────┐
//! │                 Worker thread                 │                 │
//! │   Dispatcher ── owns Engine                   │                 │
//! │     compile ─▶ engine ─▶ FileResolver::read ──┘ (FileRequest)   │
//! │                            blocks on SharedBuffer::wait         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod dispatcher;
mod engine;
mod error;
mod handle;
mod resolver;

pub use dispatcher::{Dispatcher, DEFAULT_FALLBACK_BASE_URL};
pub use engine::{Engine, EngineLoader};
pub use error::{EngineError, WorkerError, WorkerResult};
pub use handle::WorkerHandle;
pub use resolver::{DirectResolver, FileData, FileResolver, SharedMemoryResolver};
