//! Shared domain types for the Hadiya chat client.
//!
//! Conversations, chat messages, connection status, configuration, and the
//! error enums shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod ids;
pub mod session;
pub mod timestamp;
