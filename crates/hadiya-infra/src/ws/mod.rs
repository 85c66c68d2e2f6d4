//! Realtime feed over WebSocket.

pub mod connector;

pub use connector::{WsFeedConnection, WsFeedConnector, feed_url};
