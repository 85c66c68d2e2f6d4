//! MessageApi trait definition.
//!
//! Request/response access to the chat backend: history pages, sends, and
//! conversation lookup. Uses native async fn in traits (RPITIT) like the
//! other ports in this crate.

use hadiya_types::chat::{ChatMessage, Conversation, PageRequest, SendMessageRequest};
use hadiya_types::error::ApiError;
use hadiya_types::ids::{ConversationId, UserId};

use crate::auth::AuthSession;

/// REST access to conversations and messages.
///
/// Implementations live in hadiya-infra (e.g., `RestChatClient`).
pub trait MessageApi: Send + Sync {
    /// Fetch one page of history, oldest message first.
    fn fetch_history(
        &self,
        auth: &AuthSession,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, ApiError>> + Send;

    /// Persist a new message and return it with its server-assigned id.
    ///
    /// There is no idempotency key: retrying after a timeout may create a
    /// second copy on the server.
    fn send_message(
        &self,
        auth: &AuthSession,
        conversation_id: ConversationId,
        request: &SendMessageRequest,
    ) -> impl std::future::Future<Output = Result<ChatMessage, ApiError>> + Send;

    /// Create the conversation with `other_user_id`, or return the existing one.
    fn open_conversation(
        &self,
        auth: &AuthSession,
        other_user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Conversation, ApiError>> + Send;

    /// All conversations of the signed-in user, newest first.
    fn list_conversations(
        &self,
        auth: &AuthSession,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, ApiError>> + Send;
}
