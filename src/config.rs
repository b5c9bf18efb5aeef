//! Configuration loading and management.
//!
//! Loads configuration from a JSON file with environment variable overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file to load.
pub const CONFIG_PATH_ENV: &str = "MSAL_SAMPLE_CONFIG";

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_DEVICE_CODE_TIMEOUT_SECS: u64 = 100;

/// Sample configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client_id: String,
    pub authority: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Where the token cache is persisted. Defaults to the user cache directory.
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_device_code_timeout_secs")]
    pub device_code_timeout_secs: u64,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_device_code_timeout_secs() -> u64 {
    DEFAULT_DEVICE_CODE_TIMEOUT_SECS
}

impl Config {
    /// Load the config file named by `MSAL_SAMPLE_CONFIG`, or `default_path`.
    pub fn load(default_path: &str) -> Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| default_path.to_string());
        Self::from_file(&path)
    }

    /// Load configuration from a JSON file with environment variable overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_json(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration without applying overrides or validation.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Invalid configuration JSON")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = env::var("AZURE_CLIENT_ID") {
            self.client_id = client_id;
        }

        if let Ok(authority) = env::var("AZURE_AUTHORITY") {
            self.authority = authority;
        }

        if let Ok(secret) = env::var("AZURE_CLIENT_SECRET") {
            self.client_secret = Some(secret);
        }

        if let Ok(redirect_uri) = env::var("AZURE_REDIRECT_URI") {
            self.redirect_uri = Some(redirect_uri);
        }
    }

    /// Validate the fields every flow needs.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() || self.client_id == "YOUR_CLIENT_ID" {
            anyhow::bail!(
                "client_id not configured. Set AZURE_CLIENT_ID environment variable \
                 or update the config file"
            );
        }

        if self.authority.is_empty() {
            anyhow::bail!(
                "authority not configured. Set AZURE_AUTHORITY environment variable \
                 or update the config file"
            );
        }

        if self.scopes.is_empty() {
            anyhow::bail!("at least one scope must be configured");
        }

        Ok(())
    }

    /// Validate the additional fields the confidential web sample needs.
    pub fn validate_confidential(&self) -> Result<()> {
        match self.client_secret.as_deref() {
            None | Some("") | Some("YOUR_CLIENT_SECRET") => anyhow::bail!(
                "client_secret not configured. Set AZURE_CLIENT_SECRET environment variable \
                 or update the config file"
            ),
            Some(_) => {}
        }

        if self.redirect_uri.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!(
                "redirect_uri not configured. Set AZURE_REDIRECT_URI environment variable \
                 or update the config file"
            );
        }

        Ok(())
    }

    /// Path the token cache is persisted to.
    pub fn cache_path(&self) -> PathBuf {
        match &self.cache_file {
            Some(path) => path.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(env::temp_dir)
                .join("msal-samples")
                .join(format!("{}.json", self.client_id)),
        }
    }

    pub fn device_code_timeout(&self) -> Duration {
        Duration::from_secs(self.device_code_timeout_secs)
    }
}
