//! WsFeedConnector -- concrete [`FeedConnector`] over `tokio-tungstenite`.
//!
//! One WebSocket per conversation at
//! `ws(s)://<host>/ws/chat/{conversation_id}?token=<bearer token>`. Inbound
//! text frames are ChatMessage JSON; the client never sends data frames.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use hadiya_core::auth::AuthSession;
use hadiya_core::chat::{FeedConnection, FeedConnector, FeedEvent};
use hadiya_types::chat::ChatMessage;
use hadiya_types::config::ClientConfig;
use hadiya_types::error::FeedError;
use hadiya_types::ids::ConversationId;
use hadiya_types::session::ABNORMAL_CLOSURE;

/// Close code reported for a close frame that carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// How long `close` waits for the server to acknowledge.
const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the feed URL for `conversation_id` from an `http(s)` or `ws(s)`
/// base URL. The token is query-encoded.
pub fn feed_url(base_url: &str, conversation_id: ConversationId, token: &str) -> Result<Url, FeedError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| FeedError::Connect(format!("invalid feed base URL: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(FeedError::Connect(format!(
                "unsupported URL scheme for feed: {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| FeedError::Connect(format!("cannot use scheme {scheme} for feed")))?;

    let path = format!(
        "{}/ws/chat/{conversation_id}",
        url.path().trim_end_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url.query_pairs_mut().append_pair("token", token);
    url.set_fragment(None);
    Ok(url)
}

/// Opens feed connections for the configured backend.
#[derive(Debug, Clone)]
pub struct WsFeedConnector {
    base_url: String,
    handshake_timeout: Duration,
}

impl WsFeedConnector {
    /// Uses `ws_url` when configured, otherwise derives from `api_url`.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.ws_url.clone().unwrap_or_else(|| config.api_url.clone()),
            handshake_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            handshake_timeout,
        }
    }
}

impl FeedConnector for WsFeedConnector {
    type Connection = WsFeedConnection;

    async fn connect(
        &self,
        auth: &AuthSession,
        conversation_id: ConversationId,
    ) -> Result<WsFeedConnection, FeedError> {
        let url = feed_url(&self.base_url, conversation_id, auth.token())?;
        tracing::debug!(conversation_id = %conversation_id, "opening feed connection");

        let handshake = tokio::time::timeout(self.handshake_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| FeedError::Connect("feed handshake timed out".to_string()))?;

        match handshake {
            Ok((stream, _response)) => Ok(WsFeedConnection::new(stream)),
            Err(WsError::Http(response)) => {
                let status = response.status();
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    Err(FeedError::Unauthorized(format!("feed handshake rejected: HTTP {status}")))
                } else {
                    Err(FeedError::Connect(format!("feed handshake failed: HTTP {status}")))
                }
            }
            Err(err) => Err(FeedError::Connect(err.to_string())),
        }
    }
}

/// A live feed socket.
///
/// Yields exactly one [`FeedEvent::Closed`]; a transport error is followed
/// by `Closed { code: 1006 }`.
pub struct WsFeedConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending_close: Option<u16>,
    finished: bool,
}

impl WsFeedConnection {
    fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            pending_close: None,
            finished: false,
        }
    }

    fn finish(&mut self, code: u16) -> Option<FeedEvent> {
        self.finished = true;
        Some(FeedEvent::Closed { code })
    }
}

impl FeedConnection for WsFeedConnection {
    async fn next_event(&mut self) -> Option<FeedEvent> {
        if self.finished {
            return None;
        }
        if let Some(code) = self.pending_close.take() {
            return self.finish(code);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChatMessage>(text.as_str()) {
                        Ok(message) => return Some(FeedEvent::Message(message)),
                        Err(err) => {
                            tracing::warn!(error = %err, "skipping malformed feed frame");
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| u16::from(f.code))
                        .unwrap_or(NO_STATUS_RECEIVED);
                    return self.finish(code);
                }
                // Binary, ping, pong, raw frames.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    self.pending_close = Some(ABNORMAL_CLOSURE);
                    return Some(FeedEvent::Error(err.to_string()));
                }
                None => return self.finish(ABNORMAL_CLOSURE),
            }
        }
    }

    async fn close(mut self) {
        if self.finished {
            return;
        }
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client closed".into(),
        };
        if let Err(err) = self.stream.close(Some(frame)).await {
            tracing::debug!(error = %err, "feed close handshake failed");
            return;
        }
        let drain = async { while let Some(Ok(_)) = self.stream.next().await {} };
        if tokio::time::timeout(CLOSE_ACK_TIMEOUT, drain).await.is_err() {
            tracing::debug!("server did not acknowledge feed close");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use secrecy::SecretString;
    use serde_json::json;
    use tokio::sync::oneshot;

    use hadiya_types::ids::{MessageId, UserId};

    use super::*;

    const TOKEN: &str = "good token/+";

    /// What the mock server does with an accepted socket.
    #[derive(Clone, Default)]
    struct Script {
        frames: Vec<String>,
        close_code: Option<u16>,
        client_close: Arc<Mutex<Option<oneshot::Sender<Option<u16>>>>>,
    }

    async fn feed(
        State(script): State<Script>,
        Path(conversation_id): Path<i64>,
        Query(query): Query<HashMap<String, String>>,
        upgrade: WebSocketUpgrade,
    ) -> Response {
        if query.get("token").map(String::as_str) != Some(TOKEN) {
            return StatusCode::FORBIDDEN.into_response();
        }
        assert_eq!(conversation_id, 42);
        upgrade.on_upgrade(move |socket| run_script(socket, script))
    }

    async fn run_script(mut socket: WebSocket, script: Script) {
        for frame in script.frames {
            if socket.send(ws::Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
        if let Some(code) = script.close_code {
            let _ = socket
                .send(ws::Message::Close(Some(ws::CloseFrame {
                    code,
                    reason: "bye".into(),
                })))
                .await;
            return;
        }
        let reporter = script.client_close.lock().unwrap().take();
        if let Some(reporter) = reporter {
            while let Some(Ok(message)) = socket.recv().await {
                if let ws::Message::Close(frame) = message {
                    let _ = reporter.send(frame.map(|f| f.code));
                    return;
                }
            }
        }
        // Otherwise drop the socket without a close frame.
    }

    async fn spawn_feed(script: Script) -> String {
        let app = Router::new()
            .route("/ws/chat/{id}", get(feed))
            .with_state(script);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn frame(id: i64, content: &str) -> String {
        json!({
            "id": id,
            "conversation_id": 42,
            "sender_id": 9,
            "content": content,
            "sent_at": "2025-03-01T10:00:00",
            "message_type": "text"
        })
        .to_string()
    }

    fn auth(token: &str) -> AuthSession {
        AuthSession::new(UserId(7), SecretString::from(token))
    }

    async fn drain(connection: &mut WsFeedConnection) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        while let Some(event) = connection.next_event().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn feed_url_from_http_base() {
        let url = feed_url("http://localhost:8000", ConversationId(42), "abc").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/chat/42?token=abc");
    }

    #[test]
    fn feed_url_from_https_base_with_path_encodes_token() {
        let url = feed_url("https://api.example.com/v1/", ConversationId(7), "a b&c=d").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/v1/ws/chat/7");
        let token: Vec<_> = url.query_pairs().collect();
        assert_eq!(token.len(), 1);
        assert_eq!(token[0].1, "a b&c=d");
    }

    #[test]
    fn feed_url_keeps_explicit_ws_base() {
        let url = feed_url("wss://live.example.com", ConversationId(1), "t").unwrap();
        assert_eq!(url.as_str(), "wss://live.example.com/ws/chat/1?token=t");
    }

    #[test]
    fn feed_url_rejects_other_schemes() {
        assert!(matches!(
            feed_url("ftp://example.com", ConversationId(1), "t"),
            Err(FeedError::Connect(_))
        ));
        assert!(feed_url("not a url", ConversationId(1), "t").is_err());
    }

    #[tokio::test]
    async fn delivers_messages_skips_garbage_and_reports_close_code() {
        let base = spawn_feed(Script {
            frames: vec![frame(1, "hi"), "{not json".to_string(), frame(2, "there")],
            close_code: Some(4000),
            ..Script::default()
        })
        .await;
        let connector = WsFeedConnector::with_base_url(base, Duration::from_secs(5));

        let mut connection = connector.connect(&auth(TOKEN), ConversationId(42)).await.unwrap();
        let events = drain(&mut connection).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], FeedEvent::Message(m) if m.id == MessageId(1)));
        assert!(matches!(&events[1], FeedEvent::Message(m) if m.content == "there"));
        assert_eq!(events[2], FeedEvent::Closed { code: 4000 });
        assert!(connection.next_event().await.is_none());
    }

    #[tokio::test]
    async fn dropped_socket_reports_abnormal_close_once() {
        let base = spawn_feed(Script {
            frames: vec![frame(1, "hi")],
            ..Script::default()
        })
        .await;
        let connector = WsFeedConnector::with_base_url(base, Duration::from_secs(5));

        let mut connection = connector.connect(&auth(TOKEN), ConversationId(42)).await.unwrap();
        let events = drain(&mut connection).await;

        assert!(matches!(events.first(), Some(FeedEvent::Message(_))));
        assert_eq!(events.last(), Some(&FeedEvent::Closed { code: ABNORMAL_CLOSURE }));
        let closes = events
            .iter()
            .filter(|e| matches!(e, FeedEvent::Closed { .. }))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn rejected_token_is_unauthorized() {
        let base = spawn_feed(Script::default()).await;
        let connector = WsFeedConnector::with_base_url(base, Duration::from_secs(5));

        let err = connector
            .connect(&auth("stale"), ConversationId(42))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FeedError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let connector =
            WsFeedConnector::with_base_url(format!("http://{addr}"), Duration::from_secs(5));

        let err = connector
            .connect(&auth(TOKEN), ConversationId(42))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FeedError::Connect(_)));
    }

    #[tokio::test]
    async fn close_sends_normal_closure() {
        let (tx, rx) = oneshot::channel();
        let base = spawn_feed(Script {
            client_close: Arc::new(Mutex::new(Some(tx))),
            ..Script::default()
        })
        .await;
        let connector = WsFeedConnector::with_base_url(base, Duration::from_secs(5));

        let connection = connector.connect(&auth(TOKEN), ConversationId(42)).await.unwrap();
        connection.close().await;

        let code = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
        assert_eq!(code, Some(1000));
    }
}
