//! Configuration for metaport
//!
//! Stores (environments) are addressed by label. Limits tied to the remote
//! service (page sizes, write chunk sizes) live here rather than in code so
//! they can follow API changes without a rebuild.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{CoreError, Result};

/// File name looked up in the standard locations
pub const CONFIG_FILE_NAME: &str = "metaport.toml";

/// Admin API version used when an environment does not name one
pub const DEFAULT_API_VERSION: &str = "2024-10";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaportConfig {
    /// Stores keyed by environment label
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// One store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Shop host, e.g. `acme.myshopify.com`
    pub shop: String,

    /// Literal admin API access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Name of an environment variable holding the access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_env: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

/// Sizes bounded by remote service limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Records per page when listing metaobjects
    pub page_size: usize,
    /// Records per page when following up on back-references
    pub back_reference_page_size: usize,
    /// Back-references fetched inline with each metaobject
    pub inline_back_references: usize,
    /// Handles per bulk lookup query
    pub resolve_chunk_size: usize,
    /// Metafield writes per request
    pub write_chunk_size: usize,
    /// Resolution groups in flight at once
    pub resolve_concurrency: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            page_size: 250,
            back_reference_page_size: 250,
            inline_back_references: 10,
            resolve_chunk_size: 250,
            write_chunk_size: 25,
            resolve_concurrency: 4,
        }
    }
}

/// Retry policy for the HTTP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Environment variable consulted for a label's token when none is configured
pub fn default_token_var(label: &str) -> String {
    let label: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("METAPORT_{label}_TOKEN")
}

impl EnvironmentConfig {
    pub fn new(shop: impl Into<String>) -> Self {
        Self {
            shop: shop.into(),
            access_token: None,
            access_token_env: None,
            api_version: default_api_version(),
        }
    }

    /// The access token: literal, then the named variable, then
    /// `METAPORT_<LABEL>_TOKEN`
    pub fn resolve_token(&self, label: &str) -> Result<String> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }
        let var = self
            .access_token_env
            .clone()
            .unwrap_or_else(|| default_token_var(label));
        std::env::var(&var)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::ConfigurationError {
                config_path: format!("environments.{label}"),
                field: "access_token".to_string(),
                expected: format!("an access token, or the {var} environment variable"),
                cause: ConfigError::MissingField(var),
            })
    }
}

impl MetaportConfig {
    pub fn environment(&self, label: &str) -> Result<&EnvironmentConfig> {
        self.environments
            .get(label)
            .ok_or_else(|| CoreError::UnknownEnvironment {
                name: label.to_string(),
                available: self.environments.keys().cloned().collect(),
            })
    }
}

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> Result<MetaportConfig> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: path.display().to_string(),
                field: "file".to_string(),
                expected: "readable TOML file".to_string(),
                cause: ConfigError::Io(e.to_string()),
            })?;

    toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "content".to_string(),
        expected: "valid TOML configuration".to_string(),
        cause: ConfigError::TomlParse(e.to_string()),
    })
}

/// Candidate config files, most specific first
pub fn standard_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("metaport").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Load the first config found in the standard locations, or the defaults
pub async fn load_config_from_standard_locations() -> Result<MetaportConfig> {
    for path in standard_locations() {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("Loading config from {}", path.display());
            return load_config(&path).await;
        }
    }
    Ok(MetaportConfig::default())
}

/// Save configuration to a TOML file
pub async fn save_config(config: &MetaportConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: parent.display().to_string(),
                field: "directory".to_string(),
                expected: "writable directory".to_string(),
                cause: ConfigError::Io(e.to_string()),
            })?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "serialization".to_string(),
            expected: "serializable config structure".to_string(),
            cause: ConfigError::TomlSerialize(e.to_string()),
        })?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "writable file location".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    Ok(())
}
