//! `.tar.gz` package archives.
//!
//! Archives are unpacked fully in memory before anything touches the vault,
//! so a corrupt download never leaves a half-written package behind.

use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::EntryType;
use tracing::{debug, warn};

use super::error::{PackageError, PackageResult};
use crate::vfs::VirtualFs;

/// One unpacked archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the package root, `/`-separated.
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File(Vec<u8>),
}

/// Decompress and untar `bytes`.
///
/// Only directories and regular files are kept. Members with absolute paths
/// or `..` components are rejected.
pub fn unpack(bytes: &[u8]) -> PackageResult<Vec<ArchiveEntry>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let members = archive
        .entries()
        .map_err(|e| PackageError::Archive(e.to_string()))?;

    let mut entries = Vec::new();
    for member in members {
        let mut member = member.map_err(|e| PackageError::Archive(e.to_string()))?;
        let raw_path = member
            .path()
            .map_err(|e| PackageError::Archive(e.to_string()))?
            .into_owned();
        let Some(path) = relative_path(&raw_path)? else {
            continue;
        };

        match member.header().entry_type() {
            EntryType::Directory => entries.push(ArchiveEntry {
                path,
                kind: EntryKind::Directory,
            }),
            EntryType::Regular | EntryType::Continuous => {
                let mut data = Vec::with_capacity(member.size() as usize);
                member
                    .read_to_end(&mut data)
                    .map_err(|e| PackageError::Archive(e.to_string()))?;
                entries.push(ArchiveEntry {
                    path,
                    kind: EntryKind::File(data),
                });
            }
            other => {
                warn!(%path, kind = ?other, "skipping unsupported archive member");
            }
        }
    }
    Ok(entries)
}

/// Normalise an archive path. `Ok(None)` for the archive root itself.
fn relative_path(path: &Path) -> PackageResult<Option<String>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(PackageError::Archive(format!(
                    "unsafe path in archive: {}",
                    path.display()
                )))
            }
        }
    }
    Ok((!parts.is_empty()).then(|| parts.join("/")))
}

/// Write unpacked entries below `folder` (which must end with `/`).
pub async fn write_entries(
    vfs: &dyn VirtualFs,
    folder: &str,
    entries: &[ArchiveEntry],
) -> PackageResult<()> {
    vfs.create_dir_all(folder).await?;
    for entry in entries {
        let target = format!("{folder}{}", entry.path);
        match &entry.kind {
            EntryKind::Directory => vfs.create_dir_all(&target).await?,
            EntryKind::File(data) => {
                // Some archives omit directory members.
                if let Some((parent, _)) = target.rsplit_once('/') {
                    vfs.create_dir_all(parent).await?;
                }
                vfs.write(&target, data).await?;
            }
        }
    }
    debug!(folder, count = entries.len(), "package files written");
    Ok(())
}
