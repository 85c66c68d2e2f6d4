//! Live chat sessions.
//!
//! [`ChatSessionManager::open`] spawns one task per conversation. The task
//! owns everything mutable about the session: the reconciled thread, the
//! feed connection, the retry timer, and in-flight REST calls. Callers talk
//! to it through a [`ChatSessionHandle`] (commands over `mpsc`, state over
//! `watch`).
//!
//! The task loop selects over:
//! - cancellation (deliberate close or a dropped handle)
//! - handle commands
//! - the pending feed handshake
//! - events from the open feed connection
//! - the reconnection timer
//! - the notice expiry timer
//! - completed REST calls
//!
//! Nothing is published after the final `disconnected` snapshot.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use hadiya_types::chat::{ChatMessage, PageRequest, SendMessageRequest};
use hadiya_types::config::ClientConfig;
use hadiya_types::error::{ApiError, ChatError, FeedError};
use hadiya_types::ids::ConversationId;
use hadiya_types::session::{ABNORMAL_CLOSURE, ConnectionStatus};

use super::api::MessageApi;
use super::cache::{self, SharedThreadCache, ThreadCache};
use super::feed::{FeedConnection, FeedConnector, FeedEvent};
use super::reconciler::{LocalId, MessageThread, PagePlacement, ThreadEntry};
use super::reconnect::RetryTimer;
use super::state::{CloseDecision, ConnectionState};
use crate::auth::AuthSession;

const COMMAND_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Public state
// ---------------------------------------------------------------------------

/// Banner-level message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SessionNotice {
    /// Credentials were rejected. Stays until the session is closed.
    AuthRequired(String),
    /// Transient failure. Cleared automatically after the notice TTL.
    Network(String),
}

impl SessionNotice {
    pub fn message(&self) -> &str {
        match self {
            SessionNotice::AuthRequired(message) | SessionNotice::Network(message) => message,
        }
    }
}

/// Everything a view needs to render one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub conversation_id: ConversationId,
    pub status: ConnectionStatus,
    /// Reconnection attempts since the last successful open.
    pub reconnect_attempt: u32,
    /// False once automatic reconnection has given up.
    pub live_updates_available: bool,
    /// A send is outstanding.
    pub sending: bool,
    pub notice: Option<SessionNotice>,
    pub entries: Vec<ThreadEntry>,
}

impl SessionSnapshot {
    fn initial(conversation_id: ConversationId, thread: &MessageThread) -> Self {
        Self {
            conversation_id,
            status: ConnectionStatus::Disconnected,
            reconnect_attempt: 0,
            live_updates_available: true,
            sending: false,
            notice: None,
            entries: thread.entries().to_vec(),
        }
    }

    /// Delivered messages in display order.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(ThreadEntry::message)
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Opens chat sessions for one signed-in user.
pub struct ChatSessionManager<A, C> {
    api: Arc<A>,
    connector: Arc<C>,
    auth: Arc<AuthSession>,
    config: ClientConfig,
    cache: SharedThreadCache,
}

impl<A, C> ChatSessionManager<A, C>
where
    A: MessageApi + 'static,
    C: FeedConnector,
{
    pub fn new(api: Arc<A>, connector: Arc<C>, auth: Arc<AuthSession>, config: ClientConfig) -> Self {
        let cache = ThreadCache::shared(config.cache.capacity);
        Self {
            api,
            connector,
            auth,
            config,
            cache,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedThreadCache {
        &self.cache
    }

    /// Start a session for `conversation_id`.
    ///
    /// The thread is seeded from the cache, then the newest history page is
    /// fetched while the feed connects. Must be called inside a Tokio
    /// runtime.
    pub fn open(&self, conversation_id: ConversationId) -> ChatSessionHandle {
        let thread = cache::lock(&self.cache)
            .get(conversation_id)
            .unwrap_or_default();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::initial(conversation_id, &thread));
        let cancel = CancellationToken::new();

        let worker = SessionWorker {
            conversation_id,
            api: Arc::clone(&self.api),
            connector: Arc::clone(&self.connector),
            auth: Arc::clone(&self.auth),
            page_size: self.config.history.page_size,
            notice_ttl: Duration::from_millis(self.config.notice_ttl_ms),
            thread,
            state: ConnectionState::new(&self.config.reconnect),
            connection: None,
            connecting: None,
            retry: None,
            notice: None,
            notice_timer: None,
            sending: false,
            has_opened: false,
            tasks: JoinSet::new(),
            commands: command_rx,
            snapshots: snapshot_tx,
            cancel: cancel.clone(),
        };

        let span = info_span!("chat_session", conversation_id = %conversation_id);
        let task = tokio::spawn(worker.run().instrument(span));

        ChatSessionHandle {
            conversation_id,
            commands: command_tx,
            snapshots: snapshot_rx,
            cancel,
            task: Some(task),
            cache: Arc::clone(&self.cache),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    Send {
        request: SendMessageRequest,
        reply: oneshot::Sender<Result<ChatMessage, ChatError>>,
    },
    LoadOlder {
        reply: oneshot::Sender<Result<usize, ChatError>>,
    },
    Reconnect,
}

/// Caller side of a running session.
///
/// Dropping the handle cancels the session without caching its thread;
/// use [`close`](Self::close) for an orderly teardown.
pub struct ChatSessionHandle {
    conversation_id: ConversationId,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<MessageThread>>,
    cache: SharedThreadCache,
}

impl ChatSessionHandle {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Send a message and wait for the server's copy.
    ///
    /// On failure the error carries the draft so the input can be restored.
    pub async fn send(&self, request: SendMessageRequest) -> Result<ChatMessage, ChatError> {
        self.request(|reply| Command::Send { request, reply }).await?
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<ChatMessage, ChatError> {
        self.send(SendMessageRequest::text(text)).await
    }

    /// Fetch the page before the oldest loaded message. Returns how many new
    /// messages were added; zero means the beginning was reached.
    pub async fn load_older(&self) -> Result<usize, ChatError> {
        self.request(|reply| Command::LoadOlder { reply }).await?
    }

    /// Reset the retry budget and connect now if no connection is live or
    /// pending.
    pub async fn reconnect(&self) -> Result<(), ChatError> {
        self.commands
            .send(Command::Reconnect)
            .await
            .map_err(|_| ChatError::SessionClosed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Deliberate teardown. Waits for the session task to finish and stores
    /// the thread in the cache.
    pub async fn close(mut self) {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return;
        };
        match task.await {
            Ok(thread) => cache::lock(&self.cache).insert(self.conversation_id, thread),
            Err(err) => warn!(
                conversation_id = %self.conversation_id,
                error = %err,
                "chat session task failed"
            ),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ChatError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| ChatError::SessionClosed)?;
        reply_rx.await.map_err(|_| ChatError::SessionClosed)
    }
}

impl Drop for ChatSessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

enum Completion {
    Sent {
        local_id: LocalId,
        request: SendMessageRequest,
        result: Result<ChatMessage, ApiError>,
        reply: oneshot::Sender<Result<ChatMessage, ChatError>>,
    },
    History {
        placement: PagePlacement,
        result: Result<Vec<ChatMessage>, ApiError>,
        reply: Option<oneshot::Sender<Result<usize, ChatError>>>,
    },
}

struct SessionWorker<A, C: FeedConnector> {
    conversation_id: ConversationId,
    api: Arc<A>,
    connector: Arc<C>,
    auth: Arc<AuthSession>,
    page_size: u32,
    notice_ttl: Duration,

    thread: MessageThread,
    state: ConnectionState,
    connection: Option<C::Connection>,
    connecting: Option<BoxFuture<'static, Result<C::Connection, FeedError>>>,
    retry: Option<RetryTimer>,
    notice: Option<SessionNotice>,
    notice_timer: Option<Pin<Box<Sleep>>>,
    sending: bool,
    has_opened: bool,
    tasks: JoinSet<Completion>,

    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
}

impl<A, C> SessionWorker<A, C>
where
    A: MessageApi + 'static,
    C: FeedConnector,
{
    async fn run(mut self) -> MessageThread {
        info!("chat session started");
        self.spawn_history(PagePlacement::Latest, None);
        self.start_connect();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                result = poll_slot(&mut self.connecting) => {
                    self.connecting = None;
                    self.handle_connect_result(result);
                }

                event = next_feed_event(&mut self.connection) => self.handle_feed_event(event),

                attempt = poll_slot(&mut self.retry) => {
                    self.retry = None;
                    debug!(attempt, "reconnection timer fired");
                    self.start_connect();
                }

                () = poll_slot(&mut self.notice_timer) => {
                    self.notice_timer = None;
                    if matches!(self.notice, Some(SessionNotice::Network(_))) {
                        self.notice = None;
                        self.publish();
                    }
                }

                Some(joined) = self.tasks.join_next() => self.handle_completion(joined),
            }
        }

        self.shutdown().await
    }

    // -- commands -----------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { request, reply } => self.begin_send(request, reply),
            Command::LoadOlder { reply } => self.spawn_history(PagePlacement::Older, Some(reply)),
            Command::Reconnect => {
                info!("manual reconnect requested");
                self.state.reset_retries();
                self.retry = None;
                if self.connection.is_none() && self.connecting.is_none() {
                    self.start_connect();
                } else {
                    self.publish();
                }
            }
        }
    }

    fn begin_send(
        &mut self,
        request: SendMessageRequest,
        reply: oneshot::Sender<Result<ChatMessage, ChatError>>,
    ) {
        if self.sending {
            let _ = reply.send(Err(ChatError::SendInFlight));
            return;
        }
        if let Err(source) = request.validate() {
            let _ = reply.send(Err(ChatError::SendFailed { draft: request, source }));
            return;
        }

        let local_id = self.thread.begin_send(request.clone());
        self.sending = true;

        let api = Arc::clone(&self.api);
        let auth = Arc::clone(&self.auth);
        let conversation_id = self.conversation_id;
        self.tasks.spawn(async move {
            let result = api.send_message(&auth, conversation_id, &request).await;
            Completion::Sent {
                local_id,
                request,
                result,
                reply,
            }
        });
        self.publish();
    }

    fn spawn_history(
        &mut self,
        placement: PagePlacement,
        reply: Option<oneshot::Sender<Result<usize, ChatError>>>,
    ) {
        let skip = match placement {
            PagePlacement::Latest => {
                self.thread.begin_resync();
                0
            }
            PagePlacement::Older => self.thread.next_history_offset(),
        };
        let page = PageRequest::new(skip, self.page_size);
        debug!(skip, limit = self.page_size, "fetching history page");

        let api = Arc::clone(&self.api);
        let auth = Arc::clone(&self.auth);
        let conversation_id = self.conversation_id;
        self.tasks.spawn(async move {
            let result = api.fetch_history(&auth, conversation_id, page).await;
            Completion::History {
                placement,
                result,
                reply,
            }
        });
    }

    // -- REST completions ---------------------------------------------------

    fn handle_completion(&mut self, joined: Result<Completion, JoinError>) {
        match joined {
            Ok(Completion::Sent {
                local_id,
                request,
                result,
                reply,
            }) => self.finish_send(local_id, request, result, reply),
            Ok(Completion::History {
                placement,
                result,
                reply,
            }) => self.finish_history(placement, result, reply),
            Err(err) => warn!(error = %err, "session request task failed"),
        }
    }

    fn finish_send(
        &mut self,
        local_id: LocalId,
        request: SendMessageRequest,
        result: Result<ChatMessage, ApiError>,
        reply: oneshot::Sender<Result<ChatMessage, ChatError>>,
    ) {
        self.sending = false;
        let outcome = match result {
            Ok(message) => {
                debug!(message_id = %message.id, "message sent");
                self.thread.confirm_send(local_id, message.clone());
                Ok(message)
            }
            Err(source) => {
                warn!(error = %source, "send failed");
                let draft = self.thread.abandon_send(local_id).unwrap_or(request);
                self.report(&source);
                Err(ChatError::SendFailed { draft, source })
            }
        };
        self.publish();
        let _ = reply.send(outcome);
    }

    fn finish_history(
        &mut self,
        placement: PagePlacement,
        result: Result<Vec<ChatMessage>, ApiError>,
        reply: Option<oneshot::Sender<Result<usize, ChatError>>>,
    ) {
        let outcome = match result {
            Ok(page) => {
                let conversation_id = self.conversation_id;
                let page: Vec<ChatMessage> = page
                    .into_iter()
                    .filter(|m| m.conversation_id == conversation_id)
                    .collect();
                let added = self.thread.merge_page(page, placement);
                debug!(added, ?placement, "history page merged");
                Ok(added)
            }
            Err(err) => {
                warn!(error = %err, ?placement, "history fetch failed");
                self.report(&err);
                Err(ChatError::Api(err))
            }
        };
        self.publish();
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    // -- feed ---------------------------------------------------------------

    fn start_connect(&mut self) {
        if !self.state.begin_connect() {
            return;
        }
        debug!(attempt = self.state.attempt(), "connecting to feed");

        let connector = Arc::clone(&self.connector);
        let auth = Arc::clone(&self.auth);
        let conversation_id = self.conversation_id;
        self.connecting = Some(Box::pin(async move {
            connector.connect(&auth, conversation_id).await
        }));
        self.publish();
    }

    fn handle_connect_result(&mut self, result: Result<C::Connection, FeedError>) {
        match result {
            Ok(connection) => {
                info!("feed connected");
                self.state.on_open();
                self.connection = Some(connection);
                // Anything pushed while disconnected is only reachable via history.
                if self.has_opened {
                    self.spawn_history(PagePlacement::Latest, None);
                }
                self.has_opened = true;
                self.publish();
            }
            Err(FeedError::Unauthorized(message)) => {
                warn!(error = %message, "feed rejected credentials");
                let decision = self.state.on_connect_failed(true);
                self.set_notice(SessionNotice::AuthRequired(message));
                self.apply(decision);
            }
            Err(FeedError::Connect(message)) => {
                warn!(error = %message, "feed connection failed");
                let decision = self.state.on_connect_failed(false);
                self.apply(decision);
            }
        }
    }

    fn handle_feed_event(&mut self, event: Option<FeedEvent>) {
        match event {
            Some(FeedEvent::Message(message)) => {
                if message.conversation_id != self.conversation_id {
                    debug!(
                        message_id = %message.id,
                        other = %message.conversation_id,
                        "dropping message for another conversation"
                    );
                    return;
                }
                if self.thread.push_live(message) {
                    self.publish();
                }
            }
            Some(FeedEvent::Error(error)) => {
                warn!(error = %error, "feed transport error");
                self.state.on_error();
                self.publish();
            }
            Some(FeedEvent::Closed { code }) => self.on_feed_closed(code),
            None => self.on_feed_closed(ABNORMAL_CLOSURE),
        }
    }

    fn on_feed_closed(&mut self, code: u16) {
        info!(code, "feed closed");
        self.connection = None;
        let decision = self.state.on_close(code);
        self.apply(decision);
    }

    fn apply(&mut self, decision: CloseDecision) {
        match decision {
            CloseDecision::Reconnect { attempt, delay } => {
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnection"
                );
                self.retry = Some(RetryTimer::start(attempt, delay));
            }
            CloseDecision::Exhausted => {
                warn!(
                    attempts = self.state.attempt(),
                    "reconnection attempts exhausted, live updates unavailable"
                );
            }
            CloseDecision::Stopped => debug!("not reconnecting"),
        }
        self.publish();
    }

    // -- state --------------------------------------------------------------

    fn report(&mut self, err: &ApiError) {
        let notice = if err.is_auth() {
            SessionNotice::AuthRequired(err.user_message().to_string())
        } else {
            SessionNotice::Network(err.user_message().to_string())
        };
        self.set_notice(notice);
    }

    fn set_notice(&mut self, notice: SessionNotice) {
        // An auth notice is not replaced by a transient one.
        if matches!(self.notice, Some(SessionNotice::AuthRequired(_)))
            && matches!(notice, SessionNotice::Network(_))
        {
            return;
        }
        self.notice_timer = match notice {
            SessionNotice::Network(_) => Some(Box::pin(tokio::time::sleep(self.notice_ttl))),
            SessionNotice::AuthRequired(_) => None,
        };
        self.notice = Some(notice);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            conversation_id: self.conversation_id,
            status: self.state.status(),
            reconnect_attempt: self.state.attempt(),
            live_updates_available: self.state.live_updates_available(),
            sending: self.sending,
            notice: self.notice.clone(),
            entries: self.thread.entries().to_vec(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    async fn shutdown(mut self) -> MessageThread {
        self.state.terminate();
        self.retry = None;
        self.connecting = None;
        self.notice_timer = None;
        self.commands.close();
        self.tasks.abort_all();
        self.sending = false;

        let discarded = self.thread.discard_pending();
        if !discarded.is_empty() {
            debug!(count = discarded.len(), "discarded unconfirmed sends");
        }
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }

        self.publish();
        info!("chat session closed");
        self.thread
    }
}

/// Await the future in `slot`, or never resolve when the slot is empty.
async fn poll_slot<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_feed_event<F: FeedConnection>(connection: &mut Option<F>) -> Option<FeedEvent> {
    match connection.as_mut() {
        Some(connection) => connection.next_event().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
