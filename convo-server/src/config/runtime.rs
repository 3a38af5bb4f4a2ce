//! Runtime configuration re-exports.
//!
//! The actual config types are defined in `convo-core::config`.
//! This module re-exports them for convenience.

pub use convo_core::config::{ServerConfig, WebhookConfig, WebhookSecret};
