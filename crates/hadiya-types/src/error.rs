use thiserror::Error;

use crate::chat::SendMessageRequest;

/// Errors from REST calls against the chat backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The bearer token was rejected (HTTP 401). The caller should send the
    /// user back through login; nothing here retries it.
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// Transport failure or any non-401 error status.
    #[error("network error: {message}")]
    Network { status: Option<u16>, message: String },

    /// Rejected client-side; never reached the server.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. } | ApiError::Deserialization(_))
    }

    /// Text suitable for a transient banner.
    pub fn user_message(&self) -> &str {
        match self {
            ApiError::Unauthorized(message)
            | ApiError::InvalidRequest(message)
            | ApiError::Deserialization(message) => message,
            ApiError::Network { message, .. } => message,
        }
    }
}

/// Errors opening the realtime feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Handshake rejected with 401/403.
    #[error("feed rejected credentials: {0}")]
    Unauthorized(String),

    #[error("feed connection failed: {0}")]
    Connect(String),
}

/// Errors surfaced by a live chat session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    /// A send failed. The draft is returned so the compose field can be
    /// restored.
    #[error("failed to send message: {source}")]
    SendFailed {
        draft: SendMessageRequest,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Another send is still outstanding for this session.
    #[error("a message is already being sent")]
    SendInFlight,

    #[error("chat session is closed")]
    SessionClosed,
}

impl ChatError {
    pub fn is_auth(&self) -> bool {
        match self {
            ChatError::SendFailed { source, .. } => source.is_auth(),
            ChatError::Api(err) => err.is_auth(),
            ChatError::SendInFlight | ChatError::SessionClosed => false,
        }
    }

    /// The draft to put back into the compose field, if any.
    pub fn restored_draft(&self) -> Option<&SendMessageRequest> {
        match self {
            ChatError::SendFailed { draft, .. } => Some(draft),
            _ => None,
        }
    }
}
