//! Infrastructure implementations for the Hadiya chat client.
//!
//! Concrete adapters for the ports defined in `hadiya-core`: the REST
//! message client (`reqwest`), the realtime feed (`tokio-tungstenite`), and
//! the `config.toml` loader.

pub mod config;
pub mod http;
pub mod ws;
