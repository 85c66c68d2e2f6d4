//! Application state wiring the chat stack together.
//!
//! AppState pins the generic session manager to the concrete REST client and
//! WebSocket connector from hadiya-infra.

use std::sync::Arc;

use anyhow::Context;
use dialoguer::{Input, Password};
use secrecy::SecretString;

use hadiya_core::auth::AuthSession;
use hadiya_core::chat::ChatSessionManager;
use hadiya_infra::config::{load_client_config, resolve_config_dir};
use hadiya_infra::http::RestChatClient;
use hadiya_infra::ws::WsFeedConnector;
use hadiya_types::config::ClientConfig;
use hadiya_types::ids::UserId;

use crate::cli::AuthArgs;

/// Session manager pinned to the infra implementations.
pub type ConcreteSessionManager = ChatSessionManager<RestChatClient, WsFeedConnector>;

/// Shared state for every command.
pub struct AppState {
    pub config: ClientConfig,
    pub api: Arc<RestChatClient>,
    pub auth: Arc<AuthSession>,
    pub sessions: ConcreteSessionManager,
}

impl AppState {
    /// Load the config, resolve credentials, and build the clients.
    ///
    /// Missing credentials are prompted for when not provided by flag or
    /// environment.
    pub async fn init(args: &AuthArgs) -> anyhow::Result<Self> {
        let config_dir = resolve_config_dir();
        let mut config = load_client_config(&config_dir).await;
        if let Some(api_url) = &args.api_url {
            config.api_url = api_url.clone();
        }
        tracing::debug!(
            config_dir = %config_dir.display(),
            api_url = %config.api_url,
            "client config loaded"
        );

        let user_id = match args.user_id {
            Some(id) => id,
            None => {
                let raw: i64 = Input::new()
                    .with_prompt("Your user id")
                    .interact_text()?;
                UserId(raw)
            }
        };

        let token = match &args.token {
            Some(token) => SecretString::from(token.clone()),
            None => SecretString::from(
                Password::new()
                    .with_prompt("Access token")
                    .interact()?,
            ),
        };

        let auth = Arc::new(AuthSession::new(user_id, token));
        let api = Arc::new(RestChatClient::new(&config).context("Failed to build REST client")?);
        let connector = Arc::new(WsFeedConnector::new(&config));
        let sessions =
            ChatSessionManager::new(Arc::clone(&api), connector, Arc::clone(&auth), config.clone());

        Ok(Self {
            config,
            api,
            auth,
            sessions,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.auth.user_id()
    }
}
