//! REST client for the chat backend.
//!
//! [`RestChatClient`] implements [`MessageApi`](hadiya_core::chat::MessageApi)
//! over `reqwest`. Status mapping lives in [`error`].

pub mod client;
pub mod error;

pub use client::RestChatClient;
