//! Shared wire types and cryptography for conversational-AI post-call
//! webhooks.
//!
//! * [`signature`] authenticates a raw callback.
//! * [`objects`] decodes an authenticated callback into typed events.

#![forbid(unsafe_code)]

pub mod objects;
pub mod signature;
