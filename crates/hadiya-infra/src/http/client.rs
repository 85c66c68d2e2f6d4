//! RestChatClient -- concrete [`MessageApi`] implementation over HTTP.
//!
//! Endpoints (relative to `api_url`):
//! - `GET  /chat/conversations`
//! - `POST /chat/conversations`
//! - `GET  /chat/conversations/{id}/messages?skip=&limit=`
//! - `POST /chat/conversations/{id}/messages`
//!
//! Every request carries `Authorization: Bearer <token>`. The token comes
//! from the [`AuthSession`] passed per call and is never logged.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;

use hadiya_core::auth::AuthSession;
use hadiya_core::chat::MessageApi;
use hadiya_types::chat::{
    ChatMessage, Conversation, CreateConversationRequest, PageRequest, SendMessageRequest,
};
use hadiya_types::config::ClientConfig;
use hadiya_types::error::ApiError;
use hadiya_types::ids::{ConversationId, UserId};

use super::error;

/// HTTP client for the chat REST API.
#[derive(Debug, Clone)]
pub struct RestChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestChatClient {
    /// Build a client from `api_url` and `request_timeout_secs`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_base_url(
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send with the bearer header and decode a JSON success body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        auth: &AuthSession,
    ) -> Result<T, ApiError> {
        let response = request
            .header(AUTHORIZATION, auth.bearer())
            .send()
            .await
            .map_err(error::from_transport)?;

        if !response.status().is_success() {
            return Err(error::from_response(response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Deserialization(format!("failed to parse response: {e}")))
    }
}

impl MessageApi for RestChatClient {
    async fn fetch_history(
        &self,
        auth: &AuthSession,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        page.validate()?;
        tracing::debug!(
            conversation_id = %conversation_id,
            skip = page.skip,
            limit = page.limit,
            "GET history"
        );

        let request = self
            .client
            .get(self.url(&format!("/chat/conversations/{conversation_id}/messages")))
            .query(&[("skip", page.skip), ("limit", page.limit)]);
        self.execute(request, auth).await
    }

    async fn send_message(
        &self,
        auth: &AuthSession,
        conversation_id: ConversationId,
        request: &SendMessageRequest,
    ) -> Result<ChatMessage, ApiError> {
        request.validate()?;
        tracing::debug!(
            conversation_id = %conversation_id,
            message_type = %request.message_type,
            "POST message"
        );

        let builder = self
            .client
            .post(self.url(&format!("/chat/conversations/{conversation_id}/messages")))
            .json(request);
        self.execute(builder, auth).await
    }

    async fn open_conversation(
        &self,
        auth: &AuthSession,
        other_user_id: UserId,
    ) -> Result<Conversation, ApiError> {
        tracing::debug!(other_user_id = %other_user_id, "POST conversation");
        let builder = self
            .client
            .post(self.url("/chat/conversations"))
            .json(&CreateConversationRequest { other_user_id });
        self.execute(builder, auth).await
    }

    async fn list_conversations(&self, auth: &AuthSession) -> Result<Vec<Conversation>, ApiError> {
        tracing::debug!("GET conversations");
        let builder = self.client.get(self.url("/chat/conversations"));
        self.execute(builder, auth).await
    }
}
