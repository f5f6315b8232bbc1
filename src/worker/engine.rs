//! Seam between the dispatcher and the compiler engine.
//!
//! The engine itself is external. It receives the source text and a
//! [`FileResolver`] it may call any number of times, synchronously, before
//! returning its output.

use super::error::EngineError;
use super::resolver::FileResolver;
use crate::protocol::{ImageParams, RasterImage};

/// A loaded compiler instance.
pub trait Engine: Send {
    /// Register one font file (may contain a collection).
    fn add_font(&mut self, data: Vec<u8>);

    /// Drop all fonts registered through [`add_font`](Self::add_font).
    fn reset_fonts(&mut self);

    fn compile_image(
        &mut self,
        source: &str,
        path: &str,
        params: &ImageParams,
        files: &dyn FileResolver,
    ) -> Result<RasterImage, EngineError>;

    fn compile_svg(
        &mut self,
        source: &str,
        path: &str,
        files: &dyn FileResolver,
    ) -> Result<String, EngineError>;

    fn compile_pdf(
        &mut self,
        source: &str,
        path: &str,
        files: &dyn FileResolver,
    ) -> Result<Vec<u8>, EngineError>;
}

/// Builds an [`Engine`] from the compiler binary sent at startup.
pub trait EngineLoader: Send + 'static {
    type Engine: Engine;

    /// Instantiate the engine. `root` is the content root it compiles against.
    fn load(&self, binary: &[u8], root: &str) -> Result<Self::Engine, EngineError>;
}
