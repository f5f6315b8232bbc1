//! Wire-level pieces shared by the host coordinator and the compiler worker.
//!
//! # Round trip
//!
//! ```text
//!   Worker thread                                   Host task
//!   ─────────────                                   ─────────
//!   buffer = SharedBuffer::new()   (status = -1)
//!   send FileRequest { buffer, path } ───────────▶  resolve path
//!   buffer.wait()  (blocks)                         write payload, len
//!                                                   write status (last)
//!   ◀──────────────────────────────────────────────  buffer.notify()  (once)
//!   decode payload or map status to ReadError
//! ```

mod buffer;
mod messages;
mod status;
mod vpath;

pub use buffer::{
    required_words, CompletionGuard, SharedBuffer, HEADER_BYTES, HEADER_WORDS, MAX_BYTES,
    WORD_BYTES,
};
pub use messages::{
    CompileFailure, CompileFormat, CompileOutput, CompileRequest, FileRequest, ImageParams,
    RasterImage, StartupOptions, WorkerCommand, WorkerEvent,
};
pub use status::{ReadError, Status, STATUS_PENDING, STATUS_SUCCESS};
pub use vpath::{has_binary_extension, is_binary_request, VirtualPath, BINARY_SUFFIX, PACKAGE_PREFIX};
