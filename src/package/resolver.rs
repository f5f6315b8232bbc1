//! Package directory resolution.
//!
//! ```text
//! resolve(@ns/name:version)
//!   1. <data_dir>/typst/packages/ns/name/version     system data dir
//!   2. <cache_dir>/typst/packages/ns/name/version    system cache dir
//!   3. <storage>/ns/name/version/                    vault storage
//!   4. download (preview + auto_download)            -> stage, then move to 3
//!   5. not found
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::archive::{unpack, write_entries, ArchiveEntry};
use super::error::{PackageError, PackageResult};
use super::fetch::{HttpFetcher, PackageFetcher};
use super::spec::PackageSpec;
use crate::config::Settings;
use crate::vfs::VirtualFs;

/// Resolves package specs to directories, downloading when allowed.
#[derive(Clone)]
pub struct PackageResolver {
    vfs: Arc<dyn VirtualFs>,
    fetcher: Arc<dyn PackageFetcher>,
    storage: String,
    system_roots: Vec<PathBuf>,
    auto_download: bool,
}

impl PackageResolver {
    /// Create a resolver storing packages under the vault folder `storage`.
    ///
    /// No system directories are consulted and auto download is on.
    pub fn new(
        vfs: Arc<dyn VirtualFs>,
        fetcher: Arc<dyn PackageFetcher>,
        storage: impl Into<String>,
    ) -> Self {
        let mut storage = storage.into();
        if !storage.ends_with('/') {
            storage.push('/');
        }
        Self {
            vfs,
            fetcher,
            storage,
            system_roots: Vec::new(),
            auto_download: true,
        }
    }

    /// Build a resolver from settings, fetching from the configured registry.
    pub fn from_settings(settings: &Settings, vfs: Arc<dyn VirtualFs>) -> PackageResult<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&settings.packages.registry)?);
        let mut resolver = Self::new(vfs, fetcher, settings.package_storage())
            .with_auto_download(settings.packages.auto_download);
        if settings.packages.system_dirs {
            resolver = resolver.with_system_roots(system_package_roots());
        }
        Ok(resolver)
    }

    pub fn with_auto_download(mut self, enabled: bool) -> Self {
        self.auto_download = enabled;
        self
    }

    /// Directories searched before the vault, in order.
    pub fn with_system_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.system_roots = roots;
        self
    }

    /// Vault storage folder, ending with `/`.
    pub fn storage(&self) -> &str {
        &self.storage
    }

    /// Vault folder for `spec`, ending with `/`.
    pub fn storage_dir(&self, spec: &PackageSpec) -> String {
        format!("{}{}/", self.storage, spec.dir())
    }

    /// Resolve `spec` to a directory path.
    ///
    /// Repeating a successful resolution is answered from storage without
    /// touching the registry.
    pub async fn resolve(&self, spec: &PackageSpec) -> PackageResult<String> {
        for root in &self.system_roots {
            let dir = root.join(&spec.namespace).join(&spec.name).join(&spec.version);
            if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                debug!(%spec, dir = %dir.display(), "package found in system directory");
                return Ok(dir.to_string_lossy().into_owned());
            }
        }

        let folder = self.storage_dir(spec);
        if self.vfs.exists(&folder).await {
            debug!(%spec, %folder, "package found in vault storage");
            return Ok(folder);
        }

        if spec.is_preview() && self.auto_download {
            self.download(spec, &folder).await?;
            return Ok(folder);
        }

        Err(PackageError::NotFound(spec.clone()))
    }

    /// Fetch and install `spec` into `folder`.
    ///
    /// Files are written to a hidden staging folder next to the final one and
    /// moved into place only once every write succeeded, so a failed install
    /// never leaves a folder that later lookups would take for a package.
    async fn download(&self, spec: &PackageSpec, folder: &str) -> PackageResult<()> {
        let bytes = self.fetcher.fetch(spec).await?;
        let entries = unpack(&bytes)?;

        let staging = self.staging_dir(spec);
        self.vfs.remove_dir_all(&staging).await?;
        if let Err(err) = self.install(&staging, folder, &entries).await {
            warn!(%spec, error = %err, "package install failed, discarding partial files");
            if let Err(cleanup) = self.vfs.remove_dir_all(&staging).await {
                warn!(%staging, error = %cleanup, "failed to remove staging folder");
            }
            return Err(err);
        }

        info!(%spec, %folder, files = entries.len(), "package installed");
        Ok(())
    }

    async fn install(
        &self,
        staging: &str,
        folder: &str,
        entries: &[ArchiveEntry],
    ) -> PackageResult<()> {
        write_entries(self.vfs.as_ref(), staging, entries).await?;

        let target = folder.trim_end_matches('/');
        if let Err(err) = self.vfs.rename(staging.trim_end_matches('/'), target).await {
            if !self.vfs.exists(folder).await {
                return Err(err.into());
            }
            // Installed concurrently by another request.
            self.vfs.remove_dir_all(staging).await?;
        }
        Ok(())
    }

    /// `<storage>/ns/name/.version.partial/`, skipped by [`list_installed`](Self::list_installed).
    fn staging_dir(&self, spec: &PackageSpec) -> String {
        format!(
            "{}{}/{}/.{}.partial/",
            self.storage, spec.namespace, spec.name, spec.version
        )
    }

    /// Packages present in vault storage.
    pub async fn list_installed(&self) -> PackageResult<Vec<PackageSpec>> {
        let mut specs = Vec::new();
        for namespace in self.vfs.list_dirs(&self.storage).await? {
            let ns_dir = format!("{}{namespace}", self.storage);
            for name in self.vfs.list_dirs(&ns_dir).await? {
                let name_dir = format!("{ns_dir}/{name}");
                for version in self.vfs.list_dirs(&name_dir).await? {
                    if version.starts_with('.') {
                        continue;
                    }
                    specs.push(PackageSpec::new(namespace.clone(), name.clone(), version));
                }
            }
        }
        Ok(specs)
    }
}

/// `<data_dir>/typst/packages` and `<cache_dir>/typst/packages`.
pub fn system_package_roots() -> Vec<PathBuf> {
    [dirs::data_dir(), dirs::cache_dir()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join("typst").join("packages"))
        .collect()
}
