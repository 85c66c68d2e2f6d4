//! Chat session logic for the Hadiya client.
//!
//! This crate defines the "ports" (transport traits) that the infrastructure
//! layer implements, plus everything that runs on top of them: message
//! reconciliation, reconnection policy, and the per-conversation session
//! actor. It depends only on `hadiya-types` -- never on `hadiya-infra` or
//! any network crate.

pub mod auth;
pub mod chat;
