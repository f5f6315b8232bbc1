//! Local font selection.
//!
//! Configured family names are matched loosely against the fonts the
//! platform reports. Families nothing matched are looked up by file name in
//! the system font directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Names a platform reports for one installed font.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontInfo {
    pub family: String,
    pub full_name: String,
    pub postscript_name: String,
}

impl FontInfo {
    /// Case-insensitive containment against any of the font's names.
    pub fn matches(&self, configured: &str) -> bool {
        let configured = configured.to_lowercase();
        let family = self.family.to_lowercase();
        family.contains(&configured)
            || configured.contains(&family)
            || self.full_name.to_lowercase().contains(&configured)
            || self.postscript_name.to_lowercase().contains(&configured)
    }
}

/// Font data ready to hand to the compiler, plus families that were not found.
#[derive(Debug, Default)]
pub struct FontSelection {
    pub fonts: Vec<Vec<u8>>,
    pub missing: Vec<String>,
}

/// Pick the fonts in `available` that match any configured family.
///
/// Returns indices into `available` and the configured families that had
/// no match, in configuration order.
pub fn match_families(available: &[FontInfo], families: &[String]) -> (Vec<usize>, Vec<String>) {
    let mut found = HashSet::new();
    let mut matched = Vec::new();

    for (index, font) in available.iter().enumerate() {
        let mut hit = false;
        for family in families.iter().filter(|f| font.matches(f)) {
            found.insert(family.to_lowercase());
            hit = true;
        }
        if hit {
            matched.push(index);
        }
    }

    let missing = families
        .iter()
        .filter(|f| !found.contains(&f.to_lowercase()))
        .cloned()
        .collect();
    (matched, missing)
}

/// Whether a font file name looks like one of `family`.
fn file_matches(file_name: &str, family: &str) -> bool {
    let file = file_name.to_lowercase();
    let base = file.rsplit_once('.').map_or(file.as_str(), |(base, _)| base);
    let family = family.to_lowercase();
    file.contains(&family) || (!base.is_empty() && family.contains(base))
}

/// Platform font directories.
pub fn font_dirs() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if cfg!(target_os = "linux") {
        roots.push(PathBuf::from("/usr/share/fonts"));
        roots.push(PathBuf::from("/usr/local/share/fonts"));
    } else if cfg!(target_os = "macos") {
        roots.push(PathBuf::from("/Library/Fonts"));
        roots.push(PathBuf::from("/System/Library/Fonts"));
    } else if cfg!(target_os = "windows") {
        roots.push(PathBuf::from("C:\\Windows\\Fonts"));
    }
    roots.extend(dirs::font_dir());
    roots
}

/// Load font files whose names match any of `families` from `dirs`.
///
/// Unreadable directories and files are skipped. Returns the font data and
/// the families that are still missing.
pub async fn scan_font_dirs(dirs: &[PathBuf], families: &[String]) -> FontSelection {
    let mut selection = FontSelection::default();
    let mut found = HashSet::new();

    for dir in dirs {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "skipping font directory");
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let hits: Vec<&String> = families.iter().filter(|f| file_matches(&name, f)).collect();
            if hits.is_empty() {
                continue;
            }
            if let Some(data) = read_font(&entry.path()).await {
                selection.fonts.push(data);
                found.extend(hits.into_iter().map(|f| f.to_lowercase()));
            }
        }
    }

    selection.missing = families
        .iter()
        .filter(|f| !found.contains(&f.to_lowercase()))
        .cloned()
        .collect();
    selection
}

async fn read_font(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(data) => Some(data),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read font file");
            None
        }
    }
}
