//! Virtual filesystem owned by the host coordinator.
//!
//! Paths are strings as the engine sends them. Relative paths are resolved
//! against the vault root; absolute paths address the local disk directly
//! (system package directories live outside the vault).

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Async file access used by the host coordinator and the package resolver.
#[async_trait]
pub trait VirtualFs: Send + Sync {
    /// Whether a file or directory exists.
    async fn exists(&self, path: &str) -> bool;

    async fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    async fn read_to_string(&self, path: &str) -> io::Result<String>;

    /// Write a file, replacing existing content.
    async fn write(&self, path: &str, data: &[u8]) -> io::Result<()>;

    /// Create a directory and all missing parents.
    async fn create_dir_all(&self, path: &str) -> io::Result<()>;

    /// Names of the subdirectories of `path`. Missing directories yield an empty list.
    async fn list_dirs(&self, path: &str) -> io::Result<Vec<String>>;

    /// Move a file or directory. The parent of `to` must exist.
    async fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    /// Remove a directory tree. Removing a missing directory succeeds.
    async fn remove_dir_all(&self, path: &str) -> io::Result<()>;
}

/// [`VirtualFs`] backed by a directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path to a disk path.
    ///
    /// Relative paths may not climb out of the root.
    pub fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Ok(candidate.to_path_buf());
        }

        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("path escapes vault root: {path}"),
                    ))
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl VirtualFs for LocalFs {
    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path)?).await
    }

    async fn read_to_string(&self, path: &str) -> io::Result<String> {
        tokio::fs::read_to_string(self.resolve(path)?).await
    }

    async fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.resolve(path)?, data).await
    }

    async fn create_dir_all(&self, path: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)?).await
    }

    async fn list_dirs(&self, path: &str) -> io::Result<Vec<String>> {
        let full = self.resolve(path)?;
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        tokio::fs::rename(self.resolve(from)?, self.resolve(to)?).await
    }

    async fn remove_dir_all(&self, path: &str) -> io::Result<()> {
        match tokio::fs::remove_dir_all(self.resolve(path)?).await {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
