use std::path::Path;

use dlss_core::SwapConfig;
use dlss_platform::AppPaths;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub catalog_url: Option<String>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_true")]
    pub verify_checksum: bool,
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    SwapConfig::default().http_timeout_secs
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_url: None,
            debug_logging: false,
            http_timeout_secs: default_http_timeout(),
            max_log_size_bytes: default_max_log_size_bytes(),
            verify_checksum: true,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or from the per-user settings file.
    ///
    /// An explicitly named file must exist and parse. The per-user file is
    /// optional, and one that cannot be read or parsed is reported on stderr
    /// and replaced by defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        Ok(AppPaths::new().map_or_else(
            |_| Self::default(),
            |paths| Self::load_user_file(&paths.settings_file()),
        ))
    }

    fn load_user_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_path(path).unwrap_or_else(|error| {
            eprintln!("Warning: {error}; using default settings");
            Self::default()
        })
    }

    fn load_from_path(path: &Path) -> Result<Self, CliError> {
        let settings_error = |details: String| CliError::Settings {
            path: path.to_path_buf(),
            details,
        };
        let content =
            std::fs::read_to_string(path).map_err(|error| settings_error(error.to_string()))?;
        serde_json::from_str(&content).map_err(|error| settings_error(error.to_string()))
    }

    /// Combine these settings with command-line overrides.
    pub fn swap_config(&self, cli: &Cli) -> SwapConfig {
        let defaults = SwapConfig::default();
        SwapConfig {
            catalog_url: cli
                .catalog_url
                .clone()
                .or_else(|| self.catalog_url.clone())
                .unwrap_or(defaults.catalog_url),
            verify_checksum: self.verify_checksum && !cli.no_verify,
            http_timeout_secs: self.http_timeout_secs,
            ..defaults
        }
    }

    pub fn debug_enabled(&self, cli: &Cli) -> bool {
        cli.debug || self.debug_logging
    }
}
