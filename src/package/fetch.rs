//! Registry downloads.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::error::{PackageError, PackageResult};
use super::spec::PackageSpec;

/// Public Typst package registry.
pub const DEFAULT_REGISTRY: &str = "https://packages.typst.org";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of package archives.
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Download the `.tar.gz` archive of `spec`.
    ///
    /// Returns [`PackageError::NotFound`] when the registry does not know the
    /// package and [`PackageError::Transport`] for every other failure.
    async fn fetch(&self, spec: &PackageSpec) -> PackageResult<Vec<u8>>;
}

/// Fetches archives over HTTP from a registry.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    registry: String,
}

impl HttpFetcher {
    pub fn new(registry: impl Into<String>) -> PackageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| PackageError::Http(e.to_string()))?;
        Ok(Self {
            client,
            registry: registry.into(),
        })
    }

    /// `<registry>/<namespace>/<name>-<version>.tar.gz`
    pub fn archive_url(&self, spec: &PackageSpec) -> String {
        format!(
            "{}/{}/{}",
            self.registry.trim_end_matches('/'),
            spec.namespace,
            spec.archive_name()
        )
    }
}

#[async_trait]
impl PackageFetcher for HttpFetcher {
    async fn fetch(&self, spec: &PackageSpec) -> PackageResult<Vec<u8>> {
        let url = self.archive_url(spec);
        info!(%url, "downloading package");

        let transport = |message: String| PackageError::Transport {
            spec: spec.clone(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PackageError::NotFound(spec.clone()));
        }
        if !response.status().is_success() {
            return Err(transport(format!("registry answered {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
