//! Virtual paths requested by the engine.
//!
//! ```text
//! @preview/foo/0.1.0          package directory request
//! /vault/img/logo.png:binary  file, decoded as raw bytes
//! notes/intro.typ             file, decoded as UTF-8 text
//! ```

use std::path::Path;

use crate::package::{PackageSpec, SpecError};

/// Leading marker of a package request.
pub const PACKAGE_PREFIX: char = '@';

/// Trailing marker selecting binary decoding.
pub const BINARY_SUFFIX: &str = ":binary";

/// A parsed file request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    /// Resolve a package directory through the package manager.
    Package(PackageSpec),
    /// Read a file from the virtual filesystem.
    File { path: String, binary: bool },
}

impl VirtualPath {
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        if let Some(spec) = raw.strip_prefix(PACKAGE_PREFIX) {
            return PackageSpec::from_request_path(spec).map(Self::Package);
        }

        Ok(match raw.strip_suffix(BINARY_SUFFIX) {
            Some(path) => Self::File {
                path: path.to_string(),
                binary: true,
            },
            None => Self::File {
                path: raw.to_string(),
                binary: false,
            },
        })
    }

    /// Request path for a package directory.
    pub fn package_request(spec: &PackageSpec) -> String {
        format!("{}{}", PACKAGE_PREFIX, spec.dir())
    }

    /// Request path for a file, with the binary marker when `binary` is set.
    pub fn file_request(path: &str, binary: bool) -> String {
        if binary {
            format!("{path}{BINARY_SUFFIX}")
        } else {
            path.to_string()
        }
    }
}

/// Whether a raw request path carries the binary marker.
pub fn is_binary_request(raw: &str) -> bool {
    !raw.starts_with(PACKAGE_PREFIX) && raw.ends_with(BINARY_SUFFIX)
}

/// Whether an engine should request `path` as binary, judged by extension.
pub fn has_binary_extension(path: &Path) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    matches!(
        ext.to_string_lossy().to_lowercase().as_str(),
        "jpg"
            | "jpeg"
            | "png"
            | "gif"
            | "bmp"
            | "webp"
            | "svg"
            | "pdf"
            | "zip"
            | "wasm"
            | "ttf"
            | "otf"
            | "woff"
            | "woff2"
    )
}
