use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use typst_bridge::package::{
    PackageError, PackageFetcher, PackageResolver, PackageResult, PackageSpec,
};
use typst_bridge::protocol::ReadError;
use typst_bridge::vfs::{LocalFs, VirtualFs};

fn package_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in [
        ("typst.toml", &b"[package]\nname = \"foo\"\nversion = \"0.1.0\"\n"[..]),
        ("src/lib.typ", &b"#let greet(name) = [Hello #name]"[..]),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves one archive and counts downloads.
struct CountingFetcher {
    archive: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn serving(archive: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            archive: Some(archive),
            calls: AtomicUsize::new(0),
        })
    }

    fn missing() -> Arc<Self> {
        Arc::new(Self {
            archive: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageFetcher for CountingFetcher {
    async fn fetch(&self, spec: &PackageSpec) -> PackageResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.archive
            .clone()
            .ok_or_else(|| PackageError::NotFound(spec.clone()))
    }
}

struct OfflineFetcher;

#[async_trait]
impl PackageFetcher for OfflineFetcher {
    async fn fetch(&self, spec: &PackageSpec) -> PackageResult<Vec<u8>> {
        Err(PackageError::Transport {
            spec: spec.clone(),
            message: "connection refused".into(),
        })
    }
}

/// Local vault whose `fail_on`-th write fails with a disk error.
struct FailingWriteFs {
    inner: LocalFs,
    writes: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl VirtualFs for FailingWriteFs {
    async fn exists(&self, path: &str) -> bool {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn read_to_string(&self, path: &str) -> io::Result<String> {
        self.inner.read_to_string(path).await
    }

    async fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(io::Error::other("disk full"));
        }
        self.inner.write(path, data).await
    }

    async fn create_dir_all(&self, path: &str) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }

    async fn list_dirs(&self, path: &str) -> io::Result<Vec<String>> {
        self.inner.list_dirs(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn remove_dir_all(&self, path: &str) -> io::Result<()> {
        self.inner.remove_dir_all(path).await
    }
}

const STORAGE: &str = ".obsidian/plugins/typst/packages";

#[tokio::test]
async fn test_download_then_cache_hit() {
    let vault = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher::serving(package_archive());
    let resolver =
        PackageResolver::new(Arc::new(LocalFs::new(vault.path())), fetcher.clone(), STORAGE);
    let spec = PackageSpec::new("preview", "foo", "0.1.0");

    let first = resolver.resolve(&spec).await.unwrap();
    assert_eq!(first, ".obsidian/plugins/typst/packages/preview/foo/0.1.0/");
    assert_eq!(fetcher.calls(), 1);

    let lib = vault.path().join(STORAGE).join("preview/foo/0.1.0/src/lib.typ");
    assert_eq!(
        std::fs::read_to_string(lib).unwrap(),
        "#let greet(name) = [Hello #name]"
    );

    let second = resolver.resolve(&spec).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_registry_404_writes_nothing() {
    let vault = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher::missing();
    let resolver =
        PackageResolver::new(Arc::new(LocalFs::new(vault.path())), fetcher.clone(), STORAGE);
    let spec = PackageSpec::new("preview", "nope", "9.9.9");

    let err = resolver.resolve(&spec).await.unwrap_err();
    assert_eq!(err.read_error(), ReadError::NotFound);
    assert_eq!(fetcher.calls(), 1);
    assert!(!vault.path().join(STORAGE).exists());
}

#[tokio::test]
async fn test_corrupt_archive_writes_nothing() {
    let vault = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher::serving(b"<html>rate limited</html>".to_vec());
    let resolver =
        PackageResolver::new(Arc::new(LocalFs::new(vault.path())), fetcher, STORAGE);
    let spec = PackageSpec::new("preview", "foo", "0.1.0");

    let err = resolver.resolve(&spec).await.unwrap_err();
    assert_eq!(err.status_code(), 3);
    assert!(!vault.path().join(STORAGE).exists());
}

#[tokio::test]
async fn test_transport_failure_maps_to_code_3() {
    let vault = tempfile::tempdir().unwrap();
    let resolver =
        PackageResolver::new(Arc::new(LocalFs::new(vault.path())), Arc::new(OfflineFetcher), STORAGE);
    let spec = PackageSpec::new("preview", "foo", "0.1.0");

    let err = resolver.resolve(&spec).await.unwrap_err();
    assert_eq!(err.read_error(), ReadError::Transport);
}

#[tokio::test]
async fn test_auto_download_off_is_not_found() {
    let vault = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher::serving(package_archive());
    let resolver =
        PackageResolver::new(Arc::new(LocalFs::new(vault.path())), fetcher.clone(), STORAGE)
            .with_auto_download(false);
    let spec = PackageSpec::new("preview", "foo", "0.1.0");

    let err = resolver.resolve(&spec).await.unwrap_err();
    assert!(matches!(err, PackageError::NotFound(_)));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_installed_list_after_download() {
    let vault = tempfile::tempdir().unwrap();
    let resolver = PackageResolver::new(
        Arc::new(LocalFs::new(vault.path())),
        CountingFetcher::serving(package_archive()),
        STORAGE,
    );

    assert!(resolver.list_installed().await.unwrap().is_empty());
    resolver
        .resolve(&PackageSpec::new("preview", "foo", "0.1.0"))
        .await
        .unwrap();
    assert_eq!(
        resolver.list_installed().await.unwrap(),
        vec![PackageSpec::new("preview", "foo", "0.1.0")]
    );
}

#[tokio::test]
async fn test_failed_install_is_retried_not_cached() {
    let vault = tempfile::tempdir().unwrap();
    let vfs = Arc::new(FailingWriteFs {
        inner: LocalFs::new(vault.path()),
        writes: AtomicUsize::new(0),
        fail_on: 2,
    });
    let fetcher = CountingFetcher::serving(package_archive());
    let resolver = PackageResolver::new(vfs, fetcher.clone(), STORAGE);
    let spec = PackageSpec::new("preview", "foo", "0.1.0");
    let package_dir = vault.path().join(STORAGE).join("preview/foo/0.1.0");

    let err = resolver.resolve(&spec).await.unwrap_err();
    assert!(matches!(err, PackageError::Io(_)));
    assert_eq!(err.read_error(), ReadError::Generic);
    assert!(!package_dir.exists());
    assert!(!vault.path().join(STORAGE).join("preview/foo/.0.1.0.partial").exists());
    assert!(resolver.list_installed().await.unwrap().is_empty());

    let folder = resolver.resolve(&spec).await.unwrap();
    assert_eq!(folder, ".obsidian/plugins/typst/packages/preview/foo/0.1.0/");
    assert_eq!(fetcher.calls(), 2);
    assert!(package_dir.join("src/lib.typ").exists());
    assert!(package_dir.join("typst.toml").exists());
}
