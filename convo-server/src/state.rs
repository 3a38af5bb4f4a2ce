//! Application state shared across all request handlers.

use crate::config::runtime::WebhookConfig;
use convo_core::store::TranscriptStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
/// Nothing in it is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    /// Persistence sink for transcripts.
    pub store: Arc<dyn TranscriptStore>,
    /// Webhook configuration, including the shared secret.
    pub config: Arc<WebhookConfig>,
}

impl AppState {
    /// Create a new AppState with the given store and configuration.
    pub fn new(store: Arc<dyn TranscriptStore>, config: WebhookConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
