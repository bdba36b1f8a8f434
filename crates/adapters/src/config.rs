// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration.
//!
//! Configuration is explicit: it is loaded once at the edge (the CLI) and
//! passed into backend and exporter constructors. Nothing in the hashing or
//! identifier code reads it.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional YAML, TOML or JSON file
//! 3. environment variables prefixed `BENCHSTORE__`, with `__` between
//!    nested keys, e.g. `BENCHSTORE__OPENSEARCH__URL` or
//!    `BENCHSTORE__EXPORT__RETRY__MAX_ATTEMPTS`
//!
//! # Example
//!
//! ```no_run
//! use benchstore_adapters::config::PipelineConfig;
//!
//! let config = PipelineConfig::load(Some("benchstore.yaml".as_ref()))?;
//! println!("{}", config.opensearch.url);
//! # Ok::<(), benchstore_adapters::config::ConfigError>(())
//! ```

use crate::exporter::ExportSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BENCHSTORE";

/// Separator between the prefix and nested keys.
pub const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// The configuration was read but is not usable.
    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Connection settings for an OpenSearch cluster.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSearchConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Bearer token; takes precedence over basic auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub verify_ssl: bool,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            api_token: None,
            verify_ssl: true,
            timeout_ms: 30_000,
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for OpenSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub opensearch: OpenSearchConfig,
    pub export: ExportSettings,
    /// Root directory for the JSON directory backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`PipelineConfig::load`], reading environment variables from
    /// `env` instead of the process environment when it is `Some`.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let loaded: PipelineConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        tracing::debug!(config = ?loaded, "Loaded pipeline configuration");
        Ok(loaded)
    }

    /// Reject values no backend can work with.
    pub fn validate(&self) -> Result<()> {
        let url = self.opensearch.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "opensearch.url".to_string(),
                message: format!("`{url}` is not an http(s) URL"),
            });
        }
        for (key, namespace) in [
            ("export.results_namespace", &self.export.results_namespace),
            ("export.timeseries_namespace", &self.export.timeseries_namespace),
        ] {
            if namespace.is_empty() || namespace != &namespace.to_lowercase() {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    message: format!("`{namespace}` must be a non-empty lowercase name"),
                });
            }
        }
        if self.export.results_namespace == self.export.timeseries_namespace {
            return Err(ConfigError::Invalid {
                key: "export.timeseries_namespace".to_string(),
                message: "must differ from export.results_namespace".to_string(),
            });
        }
        Ok(())
    }
}
