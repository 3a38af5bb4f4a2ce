//! TOML file configuration structures.
//!
//! These structs directly map to the `convo-config.toml` file format. Every
//! section and field is optional.

use convo_sdk::signature::SIGNATURE_HEADER;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub database: DatabaseConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Webhook configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Route of the callback endpoint.
    pub path: String,
    /// Name of the composite signature header.
    pub signature_header: String,
    /// Replay window in seconds.
    pub tolerance_secs: u64,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Upsert deadline in seconds; 0 disables it.
    pub store_timeout_secs: u64,
    /// Environment variable holding the HMAC secret.
    pub secret_env: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: "/webhooks/conversation".to_string(),
            signature_header: SIGNATURE_HEADER.to_string(),
            tolerance_secs: 30 * 60,
            max_body_bytes: 1024 * 1024,
            store_timeout_secs: 10,
            secret_env: "ELEVENLABS_WEBHOOK_SECRET".to_string(),
        }
    }
}

/// Database configuration section. The connection URL itself comes from
/// `DATABASE_URL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
        }
    }
}
