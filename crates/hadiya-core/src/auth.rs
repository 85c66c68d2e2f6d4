//! Authenticated user context passed explicitly into chat components.
//!
//! Token issuance and refresh happen elsewhere; this type only carries the
//! result. The bearer token is wrapped in [`SecretString`] so it never shows
//! up in `Debug` output or logs.

use hadiya_types::ids::UserId;
use secrecy::{ExposeSecret, SecretString};

/// The signed-in user and their bearer token.
#[derive(Debug)]
pub struct AuthSession {
    user_id: UserId,
    token: SecretString,
}

impl AuthSession {
    pub fn new(user_id: UserId, token: SecretString) -> Self {
        Self { user_id, token }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Raw token, for building request headers and the feed URL only.
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}
