//! Webhook configuration.

use std::fmt;
use std::time::Duration;

/// Shared HMAC secret.
///
/// Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone)]
pub struct WebhookSecret(Box<[u8]>);

impl WebhookSecret {
    /// Wrap a secret. Returns `None` for an empty value, which counts as
    /// not configured.
    pub fn new(secret: impl Into<Box<[u8]>>) -> Option<Self> {
        let secret = secret.into();
        (!secret.is_empty()).then_some(Self(secret))
    }

    /// Get the secret key bytes for HMAC verification.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

/// Settings of the callback endpoint.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Route the callback is served on.
    pub path: String,
    /// Header carrying `t=...,v0=...`.
    pub signature_header: String,
    /// `None` means the secret is not configured; callbacks are then
    /// refused without attempting verification.
    pub secret: Option<WebhookSecret>,
    /// Maximum age of a signed request.
    pub tolerance: time::Duration,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Deadline for the store upsert. `None` waits indefinitely.
    pub store_timeout: Option<Duration>,
}
