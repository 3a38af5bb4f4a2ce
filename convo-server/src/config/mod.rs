//! Configuration module for convo-server.
//!
//! Handles loading configuration from an optional TOML file, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{ServerConfig, WebhookConfig, WebhookSecret};
use axum::http::HeaderName;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader. Without a path, defaults are used.
    pub fn new(config_path: Option<&Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.map(Path::to_path_buf),
            listen_override,
        }
    }

    /// Load the configuration, reading the secret from the process
    /// environment.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load the configuration with an explicit environment lookup.
    ///
    /// This will:
    /// 1. Read the TOML file, if any
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Resolve the webhook secret
    pub fn load_with_env(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = match &self.config_path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => FileConfig::default(),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret = env(&file_config.webhook.secret_env)
            .and_then(|s| WebhookSecret::new(s.into_bytes()));

        Ok(build_loaded_config(file_config, secret))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let webhook = &config.webhook;
    if !webhook.path.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "webhook path {:?} must start with '/'",
            webhook.path
        )));
    }
    if HeaderName::try_from(webhook.signature_header.as_str()).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "invalid signature header name {:?}",
            webhook.signature_header
        )));
    }
    if webhook.tolerance_secs == 0 {
        return Err(ConfigError::ValidationError(
            "tolerance_secs must be positive".to_string(),
        ));
    }
    if webhook.max_body_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "max_body_bytes must be positive".to_string(),
        ));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "max_connections must be positive".to_string(),
        ));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig, secret: Option<WebhookSecret>) -> LoadedConfig {
    let webhook = file_config.webhook;
    let tolerance_secs = i64::try_from(webhook.tolerance_secs).unwrap_or(i64::MAX);
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
            max_connections: file_config.database.max_connections,
        },
        webhook: WebhookConfig {
            path: webhook.path,
            signature_header: webhook.signature_header.to_ascii_lowercase(),
            secret,
            tolerance: time::Duration::seconds(tolerance_secs),
            max_body_bytes: webhook.max_body_bytes,
            store_timeout: (webhook.store_timeout_secs > 0)
                .then(|| Duration::from_secs(webhook.store_timeout_secs)),
        },
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
