//! Package import discovery in Typst source.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::spec::PackageSpec;

/// `#import "@namespace/name:version"` followed by the rest of the line.
static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)#import\s+"@([a-zA-Z0-9_-]+)/([a-zA-Z0-9._-]+):([a-zA-Z0-9._+-]+)"(.*?)$"#)
        .unwrap()
});

/// One package import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageImport {
    pub spec: PackageSpec,
    /// Text after the import path, e.g. `: canvas, draw`. Empty when absent.
    pub scoped_imports: String,
}

/// Find every package import in `source`, in order of appearance.
pub fn parse_imports(source: &str) -> Vec<PackageImport> {
    IMPORT_PATTERN
        .captures_iter(source)
        .map(|caps| PackageImport {
            spec: PackageSpec::new(caps[1].trim(), caps[2].trim(), caps[3].trim()),
            scoped_imports: caps
                .get(4)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Distinct package specs imported by `source`, first occurrence first.
pub fn unique_specs(source: &str) -> Vec<PackageSpec> {
    let mut seen = HashSet::new();
    parse_imports(source)
        .into_iter()
        .filter_map(|import| seen.insert(import.spec.clone()).then_some(import.spec))
        .collect()
}
