//! Messages exchanged between the host coordinator and a compiler worker.

use serde::{Deserialize, Serialize};

use super::buffer::SharedBuffer;

// ============================================================================
// Compile Requests
// ============================================================================

/// Parameters of a raster image compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    /// Pixel density.
    pub pixel_per_pt: f32,
    /// Background fill as `#rrggbbaa`, empty for transparent.
    #[serde(default)]
    pub fill: String,
    /// Target size in pixels (width when `display`, height otherwise).
    pub size: u32,
    /// Whether the image is a display (block) rendering.
    #[serde(default)]
    pub display: bool,
}

/// Output format of a compile, with format-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum CompileFormat {
    Image(ImageParams),
    Svg,
    Pdf,
}

impl CompileFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }
}

/// A single compile invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileRequest {
    #[serde(flatten)]
    pub format: CompileFormat,
    /// Virtual path of the main file.
    pub path: String,
    /// Full source text of the main file.
    pub source: String,
}

impl CompileRequest {
    pub fn svg(source: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            format: CompileFormat::Svg,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn pdf(source: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            format: CompileFormat::Pdf,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn image(
        source: impl Into<String>,
        path: impl Into<String>,
        params: ImageParams,
    ) -> Self {
        Self {
            format: CompileFormat::Image(params),
            path: path.into(),
            source: source.into(),
        }
    }
}

// ============================================================================
// Compile Results
// ============================================================================

/// RGBA pixels of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Successful compile output.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutput {
    /// First page as pixels.
    Image(RasterImage),
    /// SVG markup of the first page.
    Svg(String),
    /// Complete PDF document.
    Pdf(Vec<u8>),
}

impl CompileOutput {
    /// Byte view of the payload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Image(image) => &image.rgba,
            Self::Svg(svg) => svg.as_bytes(),
            Self::Pdf(pdf) => pdf,
        }
    }
}

/// A failed compile, as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileFailure {
    /// Engine error text.
    pub message: String,
    /// File-read code, when the failure came from a read.
    pub code: Option<i32>,
}

impl CompileFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

// ============================================================================
// Channel Messages
// ============================================================================

/// Engine startup payload.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Compiler binary handed to the engine loader.
    pub binary: Vec<u8>,
    /// Content root of the virtual filesystem.
    pub base_path: String,
    /// Root of the package storage folder.
    pub package_path: String,
}

/// Host → worker commands.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Startup(StartupOptions),
    Fonts(Vec<Vec<u8>>),
    ResetFonts,
    Compile(CompileRequest),
    /// Known package directories (`ns/name/version`) for the direct resolver.
    Packages(Vec<String>),
    /// Whether the shared-buffer resolver can be used.
    SharedMemory(bool),
}

impl WorkerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Startup(_) => "startup",
            Self::Fonts(_) => "fonts",
            Self::ResetFonts => "reset_fonts",
            Self::Compile(_) => "compile",
            Self::Packages(_) => "packages",
            Self::SharedMemory(_) => "shared_memory",
        }
    }
}

/// A blocking file read waiting for the host.
///
/// The worker stays parked until the buffer is notified. A request dropped
/// unanswered (the host went away with it still queued, or discarded it)
/// releases the worker with [`ReadError::Generic`](super::ReadError::Generic).
#[derive(Debug)]
pub struct FileRequest {
    pub buffer: SharedBuffer,
    pub path: String,
    _release: ReleaseOnDrop,
}

impl FileRequest {
    pub fn new(buffer: SharedBuffer, path: impl Into<String>) -> Self {
        Self {
            _release: ReleaseOnDrop(buffer.clone()),
            buffer,
            path: path.into(),
        }
    }
}

#[derive(Debug)]
struct ReleaseOnDrop(SharedBuffer);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Worker → host events.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Engine initialization finished.
    Ready,
    /// Engine initialization (or a command) failed.
    Error(String),
    /// Final outcome of a compile.
    CompileResult(Result<CompileOutput, CompileFailure>),
    /// The engine is blocked on a file read.
    FileRequest(FileRequest),
}
