//! TOML-based configuration for typst-bridge.
//!
//! Supports a config file (`typst-bridge.toml`) with environment variable
//! expansion in path values.
//!
//! Example configuration:
//! ```toml
//! [vault]
//! root = "${HOME}/notes"
//! config_dir = ".obsidian"
//!
//! [packages]
//! auto_download = true
//! registry = "https://packages.typst.org"
//! system_dirs = true
//!
//! [worker]
//! shared_memory = true
//!
//! [compile]
//! use_layout_functions = true
//!
//! [fonts]
//! families = ["Inter", "JetBrains Mono"]
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::package::DEFAULT_REGISTRY;
use crate::worker::DEFAULT_FALLBACK_BASE_URL;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TYPST_BRIDGE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "typst-bridge.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub vault: VaultSettings,
    pub packages: PackageSettings,
    pub worker: WorkerSettings,
    pub compile: CompileSettings,
    pub fonts: FontSettings,
}

/// Vault location.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Vault root directory (supports `${ENV_VAR}` expansion).
    pub root: String,

    /// Vault-relative configuration folder.
    pub config_dir: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            config_dir: ".obsidian".to_string(),
        }
    }
}

/// Package resolution settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Download missing `preview` packages from the registry.
    pub auto_download: bool,

    /// Registry base URL.
    pub registry: String,

    /// Vault-relative package storage folder.
    /// Defaults to `<config_dir>/plugins/typst/packages`.
    pub storage: Option<String>,

    /// Look in the system Typst data and cache directories first.
    pub system_dirs: bool,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            auto_download: true,
            registry: DEFAULT_REGISTRY.to_string(),
            storage: None,
            system_dirs: true,
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Answer reads through shared buffers. When off, the worker fetches
    /// files itself from `fallback_base_url`.
    pub shared_memory: bool,

    /// URL prefix for direct file fetches.
    pub fallback_base_url: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            shared_memory: true,
            fallback_base_url: DEFAULT_FALLBACK_BASE_URL.to_string(),
        }
    }
}

/// Compile input settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Prepend `layout_functions` to every source.
    pub use_layout_functions: bool,

    /// Typst preamble with `%NAME%` template variables.
    pub layout_functions: String,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            use_layout_functions: true,
            layout_functions: DEFAULT_LAYOUT_FUNCTIONS.to_string(),
        }
    }
}

/// Preamble used when no custom layout functions are configured.
pub const DEFAULT_LAYOUT_FUNCTIONS: &str = r#"#set page(
  width: %LINEWIDTH%,
  height: auto,
  margin: (x: 0.25em, y: 0.25em),
  fill: rgb("%BGCOLOR%")
)

#set text(
  size: %FONTSIZE%,
  fill: rgb("%THEMECOLOR%")
)

#set par(
  justify: true,
  leading: 0.65em
)
"#;

/// Font selection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FontSettings {
    /// Family names of local fonts handed to the compiler. Matched
    /// against font file names in the platform font directories.
    pub families: Vec<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TYPST_BRIDGE_CONFIG`
    /// 2. `./typst-bridge.toml`
    /// 3. `~/.config/typst-bridge/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("typst-bridge").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Vault root with environment variables expanded.
    pub fn vault_root(&self) -> Result<PathBuf, SettingsError> {
        Ok(PathBuf::from(expand_env_vars(&self.vault.root)?))
    }

    /// Vault-relative package storage folder, always ending with `/`.
    pub fn package_storage(&self) -> String {
        let storage = match &self.packages.storage {
            Some(storage) => storage.trim_end_matches('/').to_string(),
            None => format!(
                "{}/plugins/typst/packages",
                self.vault.config_dir.trim_end_matches('/')
            ),
        };
        format!("{storage}/")
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept as is.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let lookup = |name: &str| {
        env::var(name).map_err(|_| SettingsError::MissingEnvVar(name.to_string()))
    };

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        if chars.next_if_eq(&'{').is_some() {
            let name: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
            result.push_str(&lookup(&name)?);
            continue;
        }

        let mut name = String::new();
        while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
            name.push(ch);
        }
        if name.is_empty() {
            result.push('$');
        } else {
            result.push_str(&lookup(&name)?);
        }
    }

    Ok(result)
}
