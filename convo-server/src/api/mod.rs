//! HTTP API of the conversation webhook.

pub mod extractors;
pub mod webhook;
