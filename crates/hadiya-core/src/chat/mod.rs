//! Chat session layer: transport ports, reconciliation, reconnection, and
//! the per-conversation session actor.

pub mod api;
pub mod cache;
pub mod feed;
pub mod reconciler;
pub mod reconnect;
pub mod session;
pub mod state;

pub use api::MessageApi;
pub use feed::{FeedConnection, FeedConnector, FeedEvent};
pub use reconciler::{LocalId, MessageThread, PagePlacement, ThreadEntry};
pub use session::{ChatSessionHandle, ChatSessionManager, SessionNotice, SessionSnapshot};
