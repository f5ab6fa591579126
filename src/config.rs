//! Configuration for schema-walk
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-walk.toml)
//! - Environment variables (SCHEMA_WALK__*)
//!
//! ## Example config file (schema-walk.toml):
//! ```toml
//! [traversal]
//! root_path = "#"
//! timeout_ms = 5000
//!
//! [output]
//! format = "pretty"
//!
//! [files]
//! extension = "json"
//! skip_prefixes = ["target/", ".git/"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cancel::CancellationToken;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkConfig {
    #[serde(default)]
    pub traversal: TraversalConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Which files the CLI picks up when given a directory
    #[serde(default)]
    pub files: FilesConfig,
}

/// Traversal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Path reported for the traversal root
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Cancel a traversal after this many milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// File extension of schema documents, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Relative path prefixes to skip
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

fn default_root_path() -> String {
    crate::visitor::ROOT_PATH.to_string()
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_skip_prefixes() -> Vec<String> {
    vec!["target/".to_string(), ".git/".to_string()]
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            timeout_ms: None,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl TraversalConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Fresh token honouring the configured timeout
    pub fn cancellation_token(&self) -> CancellationToken {
        match self.timeout() {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        }
    }
}

impl FilesConfig {
    /// Whether `relative` should be loaded as a schema document
    pub fn accepts(&self, relative: &Path) -> bool {
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if self
            .skip_prefixes
            .iter()
            .any(|prefix| relative_str.starts_with(prefix.as_str()))
        {
            return false;
        }
        relative
            .extension()
            .map(|ext| ext == self.extension.as_str())
            .unwrap_or(false)
    }
}

impl WalkConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-walk.toml",
            ".schema-walk.toml",
            "config/schema-walk.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "schema-walk", "schema-walk")
        {
            let xdg_config = config_dir.config_dir().join("schema-walk.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_WALK__TRAVERSAL__TIMEOUT_MS=500
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_WALK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
