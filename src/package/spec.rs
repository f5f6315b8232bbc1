//! Package specifications (`@namespace/name:version`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespace of packages published to the public registry.
pub const PREVIEW_NAMESPACE: &str = "preview";

/// A versioned package reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageSpec {
    pub namespace: String,
    pub name: String,
    pub version: String,
}

/// Error for malformed package specifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid package specification: {0}")]
pub struct SpecError(pub String);

impl PackageSpec {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse the directory form used in file requests: `namespace/name/version`.
    ///
    /// A leading `@` and a trailing `/` are tolerated.
    pub fn from_request_path(path: &str) -> Result<Self, SpecError> {
        let trimmed = path.trim_start_matches('@').trim_end_matches('/');
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(name), Some(version), None)
                if !ns.is_empty() && !name.is_empty() && !version.is_empty() =>
            {
                Ok(Self::new(ns, name, version))
            }
            _ => Err(SpecError(path.to_string())),
        }
    }

    /// Relative directory of this package: `namespace/name/version`.
    pub fn dir(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.version)
    }

    /// Whether this package lives in the public `preview` namespace.
    pub fn is_preview(&self) -> bool {
        self.namespace == PREVIEW_NAMESPACE
    }

    /// Archive file name on the registry: `name-version.tar.gz`.
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.version)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}:{}", self.namespace, self.name, self.version)
    }
}

impl FromStr for PackageSpec {
    type Err = SpecError;

    /// Parse the import form `@namespace/name:version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('@')
            .ok_or_else(|| SpecError(s.to_string()))?;
        let (namespace, rest) = rest
            .split_once('/')
            .ok_or_else(|| SpecError(s.to_string()))?;
        let (name, version) = rest
            .split_once(':')
            .ok_or_else(|| SpecError(s.to_string()))?;

        if namespace.is_empty() || name.is_empty() || version.is_empty() {
            return Err(SpecError(s.to_string()));
        }
        Ok(Self::new(namespace, name, version))
    }
}
