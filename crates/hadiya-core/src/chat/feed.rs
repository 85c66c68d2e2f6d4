//! Realtime feed traits.
//!
//! A [`FeedConnector`] opens one duplex connection per conversation; the
//! resulting [`FeedConnection`] yields [`FeedEvent`]s in delivery order.
//! The client never sends data frames, only the final close.

use hadiya_types::chat::ChatMessage;
use hadiya_types::error::FeedError;
use hadiya_types::ids::ConversationId;

use crate::auth::AuthSession;

/// Something that happened on a live feed connection.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A pushed message, already parsed.
    Message(ChatMessage),
    /// Transport failure. A `Closed` event always follows.
    Error(String),
    /// The connection ended. Emitted exactly once per connection.
    Closed { code: u16 },
}

/// One open feed connection.
pub trait FeedConnection: Send + 'static {
    /// Next event, or `None` once `Closed` has been reported.
    fn next_event(&mut self) -> impl std::future::Future<Output = Option<FeedEvent>> + Send;

    /// Deliberately close with a normal closure (code 1000).
    fn close(self) -> impl std::future::Future<Output = ()> + Send;
}

/// Opens feed connections.
///
/// Implementations live in hadiya-infra (e.g., `WsFeedConnector`).
pub trait FeedConnector: Send + Sync + 'static {
    type Connection: FeedConnection;

    fn connect(
        &self,
        auth: &AuthSession,
        conversation_id: ConversationId,
    ) -> impl std::future::Future<Output = Result<Self::Connection, FeedError>> + Send;
}
