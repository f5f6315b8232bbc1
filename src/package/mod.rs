//! Typst package management.
//!
//! Package specs, import discovery, registry downloads and the resolution
//! order used to answer `@namespace/name/version` file requests.

mod archive;
mod error;
mod fetch;
mod imports;
mod resolver;
mod spec;

pub use archive::{unpack, write_entries, ArchiveEntry, EntryKind};
pub use error::{PackageError, PackageResult};
pub use fetch::{HttpFetcher, PackageFetcher, DEFAULT_REGISTRY};
pub use imports::{parse_imports, unique_specs, PackageImport};
pub use resolver::{system_package_roots, PackageResolver};
pub use spec::{PackageSpec, SpecError, PREVIEW_NAMESPACE};
