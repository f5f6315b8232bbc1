//! Configuration module for typst-bridge.
//!
//! Handles the config file, environment variables, and settings defaults.

mod settings;

pub use settings::{
    expand_env_vars, CompileSettings, FontSettings, PackageSettings, Settings,
    SettingsError, VaultSettings, WorkerSettings, CONFIG_ENV_VAR, DEFAULT_LAYOUT_FUNCTIONS,
    LOCAL_CONFIG_FILE,
};
