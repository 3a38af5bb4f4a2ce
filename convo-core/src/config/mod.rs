//! Configuration types for the conversation webhook.
//!
//! These types represent the validated runtime configuration used by the
//! server. Loading from files, flags and the environment is handled by the
//! server crate; handlers only ever see these structs.

mod server;
mod webhook;

pub use server::ServerConfig;
pub use webhook::{WebhookConfig, WebhookSecret};
