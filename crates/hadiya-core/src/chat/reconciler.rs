//! Message reconciliation for a single conversation.
//!
//! Messages reach the client along two independent paths: the response to a
//! send call and the realtime feed push. [`MessageThread`] folds both into
//! one list that never holds two entries with the same server id.
//!
//! Rules:
//! - The server id is the only identity. The first entry seen for an id
//!   wins; later arrivals with the same id are dropped, not merged.
//! - Live messages are appended in arrival order. Nothing already in the
//!   list is ever moved, and timestamps never decide order.
//! - An outgoing message is shown as a pending local echo until its send
//!   call resolves.
//! - Delivered messages always form one run ending at the newest message.
//!   When a fresh newest page shares nothing with older loaded messages,
//!   those older messages are dropped and paged back in, so the history
//!   offset stays a valid `skip`.

use std::collections::HashSet;

use serde::Serialize;

use hadiya_types::chat::{ChatMessage, SendMessageRequest};
use hadiya_types::ids::MessageId;

/// Client-side handle for a pending local echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LocalId(pub u64);

/// One row of the displayed conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ThreadEntry {
    /// Sent by this client; the server has not confirmed it yet.
    Pending {
        local_id: LocalId,
        draft: SendMessageRequest,
    },
    /// Confirmed by the server.
    Delivered(ChatMessage),
}

impl ThreadEntry {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            ThreadEntry::Delivered(message) => Some(message.id),
            ThreadEntry::Pending { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            ThreadEntry::Delivered(message) => Some(message),
            ThreadEntry::Pending { .. } => None,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ThreadEntry::Delivered(message) => &message.content,
            ThreadEntry::Pending { draft, .. } => &draft.content,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ThreadEntry::Pending { .. })
    }
}

/// Where a history page belongs relative to what is already loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePlacement {
    /// The newest page (`skip = 0`). Unanchored messages go to the back.
    Latest,
    /// A page further back in time. Unanchored messages go to the front.
    Older,
}

/// Duplicate-free, append-only message list for one conversation.
#[derive(Debug, Clone, Default)]
pub struct MessageThread {
    entries: Vec<ThreadEntry>,
    seen: HashSet<MessageId>,
    /// Delivered by the feed or a send since the newest page was requested.
    /// These are never older than that page.
    recent: HashSet<MessageId>,
    next_local_id: u64,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ThreadEntry] {
        &self.entries
    }

    /// Delivered messages in display order.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(ThreadEntry::message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.seen.contains(&id)
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(ThreadEntry::is_pending)
    }

    /// `skip` for the next older history page: how many messages are loaded,
    /// counting back from the newest.
    pub fn next_history_offset(&self) -> u32 {
        u32::try_from(self.seen.len()).unwrap_or(u32::MAX)
    }

    /// Append a message pushed by the realtime feed.
    ///
    /// Returns `false` when the id is already present; the existing entry is
    /// kept untouched.
    pub fn push_live(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.recent.insert(message.id);
        self.entries.push(ThreadEntry::Delivered(message));
        true
    }

    /// Call when requesting the newest history page. Messages delivered
    /// from now on count as newer than that page when it is merged.
    pub fn begin_resync(&mut self) {
        self.recent.clear();
    }

    /// Append the local echo of an outgoing message.
    pub fn begin_send(&mut self, draft: SendMessageRequest) -> LocalId {
        let local_id = LocalId(self.next_local_id);
        self.next_local_id += 1;
        self.entries.push(ThreadEntry::Pending { local_id, draft });
        local_id
    }

    /// Resolve a pending echo with the server's copy.
    ///
    /// If the feed already delivered this id, the echo is removed and the
    /// earlier entry stays. Otherwise the echo is replaced in place. Returns
    /// whether the confirmed message took the echo's slot.
    pub fn confirm_send(&mut self, local_id: LocalId, message: ChatMessage) -> bool {
        let Some(index) = self.pending_index(local_id) else {
            return self.push_live(message);
        };
        if self.seen.contains(&message.id) {
            self.entries.remove(index);
            return false;
        }
        self.seen.insert(message.id);
        self.recent.insert(message.id);
        self.entries[index] = ThreadEntry::Delivered(message);
        true
    }

    /// Drop a pending echo after a failed send and hand back its draft.
    pub fn abandon_send(&mut self, local_id: LocalId) -> Option<SendMessageRequest> {
        let index = self.pending_index(local_id)?;
        match self.entries.remove(index) {
            ThreadEntry::Pending { draft, .. } => Some(draft),
            ThreadEntry::Delivered(_) => None,
        }
    }

    /// Drop every pending echo, returning their drafts in display order.
    pub fn discard_pending(&mut self) -> Vec<SendMessageRequest> {
        let mut drafts = Vec::new();
        self.entries.retain(|entry| match entry {
            ThreadEntry::Pending { draft, .. } => {
                drafts.push(draft.clone());
                false
            }
            ThreadEntry::Delivered(_) => true,
        });
        drafts
    }

    /// Merge a chronological history page, returning how many messages were
    /// new.
    ///
    /// Each unseen message is inserted right after the previous page message
    /// already in the list, or right before the next one. Messages with no
    /// anchor either way are placed according to `placement`: an older page
    /// goes to the front, the newest page goes before anything delivered
    /// since [`begin_resync`](Self::begin_resync), else at the back.
    pub fn merge_page(&mut self, page: Vec<ChatMessage>, placement: PagePlacement) -> usize {
        if placement == PagePlacement::Latest {
            self.drop_disconnected(&page);
        }

        let ids: Vec<MessageId> = page.iter().map(|m| m.id).collect();
        let mut previous: Option<MessageId> = None;
        let mut inserted = 0;

        for (offset, message) in page.into_iter().enumerate() {
            let id = message.id;
            if self.seen.contains(&id) {
                previous = Some(id);
                continue;
            }

            let after_previous = previous.and_then(|p| self.position_of(p)).map(|i| i + 1);
            let before_next = || ids[offset + 1..].iter().find_map(|next| self.position_of(*next));
            let index = match after_previous.or_else(before_next) {
                Some(index) => index,
                None => match placement {
                    PagePlacement::Latest => self
                        .first_recent_index()
                        .unwrap_or_else(|| self.tail_insert_index()),
                    PagePlacement::Older => 0,
                },
            };

            self.seen.insert(id);
            self.entries.insert(index, ThreadEntry::Delivered(message));
            previous = Some(id);
            inserted += 1;
        }

        if placement == PagePlacement::Latest {
            self.recent.clear();
        }
        inserted
    }

    /// Drop delivered messages that the newest `page` cannot connect to.
    ///
    /// If the page's oldest message is unknown, every delivered message
    /// listed before the first one the page shares (all of them when it
    /// shares none) may be separated from the page by unseen history. Those
    /// go, except messages delivered since the page was requested. Returns
    /// how many were dropped.
    fn drop_disconnected(&mut self, page: &[ChatMessage]) -> usize {
        let Some(oldest) = page.first() else {
            return 0;
        };
        if self.seen.contains(&oldest.id) {
            return 0;
        }

        let first_shared = page
            .iter()
            .find_map(|m| self.position_of(m.id))
            .unwrap_or(self.entries.len());
        let stale: Vec<MessageId> = self.entries[..first_shared]
            .iter()
            .filter_map(ThreadEntry::message_id)
            .filter(|id| !self.recent.contains(id))
            .collect();
        if stale.is_empty() {
            return 0;
        }

        for id in &stale {
            self.seen.remove(id);
        }
        let seen = &self.seen;
        self.entries.retain(|entry| match entry.message_id() {
            Some(id) => seen.contains(&id),
            None => true,
        });
        tracing::debug!(dropped = stale.len(), "history gap, dropped disconnected messages");
        stale.len()
    }

    fn position_of(&self, id: MessageId) -> Option<usize> {
        if !self.seen.contains(&id) {
            return None;
        }
        self.entries.iter().position(|e| e.message_id() == Some(id))
    }

    fn first_recent_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.message_id().is_some_and(|id| self.recent.contains(&id)))
    }

    /// End of the delivered messages, ahead of any trailing local echoes.
    fn tail_insert_index(&self) -> usize {
        let trailing_pending = self.entries.iter().rev().take_while(|e| e.is_pending()).count();
        self.entries.len() - trailing_pending
    }

    fn pending_index(&self, local_id: LocalId) -> Option<usize> {
        self.entries.iter().position(|e| {
            matches!(e, ThreadEntry::Pending { local_id: l, .. } if *l == local_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hadiya_types::chat::MessageType;
    use hadiya_types::ids::{ConversationId, UserId};

    fn msg(id: i64, content: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId(id),
            conversation_id: ConversationId(42),
            sender_id: UserId(7),
            content: content.to_string(),
            sent_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            message_type: MessageType::Text,
            invoice_description: None,
            invoice_gift_price: None,
            invoice_service_fee: None,
            invoice_delivery_fee: None,
            invoice_total: None,
        }
    }

    fn ids(thread: &MessageThread) -> Vec<i64> {
        thread.messages().map(|m| m.id.0).collect()
    }

    #[test]
    fn test_push_live_ignores_duplicate_ids() {
        let mut thread = MessageThread::new();
        assert!(thread.push_live(msg(1, "first")));
        assert!(!thread.push_live(msg(1, "replayed")));
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.entries()[0].content(), "first");
    }

    #[test]
    fn test_send_then_feed_push_keeps_one_entry() {
        let mut thread = MessageThread::new();
        let local = thread.begin_send(SendMessageRequest::text("hello"));
        assert!(thread.has_pending());

        assert!(thread.confirm_send(local, msg(501, "hello")));
        assert!(!thread.push_live(msg(501, "hello")));

        assert_eq!(ids(&thread), vec![501]);
        assert!(!thread.has_pending());
    }

    #[test]
    fn test_feed_push_before_send_response_keeps_first_seen() {
        let mut thread = MessageThread::new();
        let local = thread.begin_send(SendMessageRequest::text("hello"));
        assert!(thread.push_live(msg(501, "from feed")));

        assert!(!thread.confirm_send(local, msg(501, "from response")));

        assert_eq!(thread.len(), 1);
        assert_eq!(thread.entries()[0].content(), "from feed");
    }

    #[test]
    fn test_confirm_replaces_echo_in_place() {
        let mut thread = MessageThread::new();
        thread.push_live(msg(1, "a"));
        let local = thread.begin_send(SendMessageRequest::text("b"));
        thread.push_live(msg(2, "c"));

        thread.confirm_send(local, msg(3, "b"));

        assert_eq!(ids(&thread), vec![1, 3, 2]);
    }

    #[test]
    fn test_abandon_returns_draft() {
        let mut thread = MessageThread::new();
        let local = thread.begin_send(SendMessageRequest::text("retry me"));
        let draft = thread.abandon_send(local).unwrap();
        assert_eq!(draft.content, "retry me");
        assert!(thread.is_empty());
        assert!(thread.abandon_send(local).is_none());
    }

    #[test]
    fn test_discard_pending_keeps_delivered() {
        let mut thread = MessageThread::new();
        thread.push_live(msg(1, "a"));
        thread.begin_send(SendMessageRequest::text("lost"));
        let drafts = thread.discard_pending();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].content, "lost");
        assert_eq!(ids(&thread), vec![1]);
        assert!(!thread.has_pending());
    }

    #[test]
    fn test_interleaved_paths_never_duplicate() {
        let mut thread = MessageThread::new();
        let sends: Vec<LocalId> = (0..4)
            .map(|i| thread.begin_send(SendMessageRequest::text(format!("m{i}"))))
            .collect();

        // Feed delivers odd ids first, responses arrive afterwards for all.
        thread.push_live(msg(11, "m1"));
        thread.push_live(msg(13, "m3"));
        for (i, local) in sends.into_iter().enumerate() {
            thread.confirm_send(local, msg(10 + i as i64, &format!("m{i}")));
        }
        for id in 10..14 {
            thread.push_live(msg(id, "again"));
        }

        let mut seen = ids(&thread);
        assert_eq!(seen.len(), 4);
        seen.sort();
        seen.dedup();
        assert_eq!(seen, vec![10, 11, 12, 13]);
        assert!(!thread.has_pending());
    }

    #[test]
    fn test_latest_page_goes_before_live_messages_it_contains() {
        let mut thread = MessageThread::new();
        thread.push_live(msg(600, "live"));

        let page = (551..=600).map(|id| msg(id, "h")).collect();
        let inserted = thread.merge_page(page, PagePlacement::Latest);

        assert_eq!(inserted, 49);
        assert_eq!(ids(&thread), (551..=600).collect::<Vec<_>>());
    }

    #[test]
    fn test_latest_page_appends_after_cached_messages() {
        let mut thread = MessageThread::new();
        thread.merge_page((400..=550).map(|id| msg(id, "old")).collect(), PagePlacement::Latest);

        thread.merge_page((520..=600).map(|id| msg(id, "new")).collect(), PagePlacement::Latest);

        assert_eq!(ids(&thread), (400..=600).collect::<Vec<_>>());
        assert_eq!(thread.next_history_offset(), 201);
    }

    #[test]
    fn test_older_page_goes_to_front() {
        let mut thread = MessageThread::new();
        thread.merge_page((51..=100).map(|id| msg(id, "p1")).collect(), PagePlacement::Latest);

        let inserted = thread.merge_page((1..=50).map(|id| msg(id, "p2")).collect(), PagePlacement::Older);

        assert_eq!(inserted, 50);
        assert_eq!(ids(&thread), (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_merge_page_skips_duplicates_within_page() {
        let mut thread = MessageThread::new();
        let inserted = thread.merge_page(vec![msg(1, "a"), msg(1, "b"), msg(2, "c")], PagePlacement::Latest);
        assert_eq!(inserted, 2);
        assert_eq!(thread.entries()[0].content(), "a");
    }

    #[test]
    fn test_disconnected_latest_page_replaces_old_messages() {
        let mut thread = MessageThread::new();
        thread.merge_page((51..=100).map(|id| msg(id, "old")).collect(), PagePlacement::Latest);

        thread.begin_resync();
        let inserted = thread.merge_page((251..=300).map(|id| msg(id, "new")).collect(), PagePlacement::Latest);

        assert_eq!(inserted, 50);
        assert_eq!(ids(&thread), (251..=300).collect::<Vec<_>>());
        assert_eq!(thread.next_history_offset(), 50);

        // 51..=100 arrive again once paging gets back to them.
        thread.merge_page((201..=250).map(|id| msg(id, "p")).collect(), PagePlacement::Older);
        assert_eq!(ids(&thread), (201..=300).collect::<Vec<_>>());
        assert_eq!(thread.next_history_offset(), 100);
    }

    #[test]
    fn test_disconnected_latest_page_keeps_pending_echo_last() {
        let mut thread = MessageThread::new();
        thread.merge_page((51..=100).map(|id| msg(id, "old")).collect(), PagePlacement::Latest);
        thread.begin_send(SendMessageRequest::text("queued"));

        thread.begin_resync();
        thread.merge_page((251..=300).map(|id| msg(id, "new")).collect(), PagePlacement::Latest);

        assert_eq!(ids(&thread), (251..=300).collect::<Vec<_>>());
        assert_eq!(thread.len(), 51);
        assert!(thread.entries().last().is_some_and(ThreadEntry::is_pending));
    }

    #[test]
    fn test_disconnected_latest_page_goes_before_newer_live_messages() {
        let mut thread = MessageThread::new();
        thread.merge_page((51..=100).map(|id| msg(id, "old")).collect(), PagePlacement::Latest);
        thread.push_live(msg(101, "before disconnect"));

        thread.begin_resync();
        thread.push_live(msg(301, "after the page was fetched"));
        thread.merge_page((251..=300).map(|id| msg(id, "new")).collect(), PagePlacement::Latest);

        assert_eq!(ids(&thread), (251..=301).collect::<Vec<_>>());
        assert_eq!(thread.next_history_offset(), 51);
    }

    #[test]
    fn test_overlapping_latest_page_keeps_old_messages() {
        let mut thread = MessageThread::new();
        thread.merge_page((51..=100).map(|id| msg(id, "old")).collect(), PagePlacement::Latest);

        thread.begin_resync();
        thread.push_live(msg(130, "live"));
        thread.merge_page((81..=130).map(|id| msg(id, "new")).collect(), PagePlacement::Latest);

        assert_eq!(ids(&thread), (51..=130).collect::<Vec<_>>());
    }

    #[test]
    fn test_merge_page_keeps_pending_echo_last() {
        let mut thread = MessageThread::new();
        thread.begin_send(SendMessageRequest::text("typing"));
        thread.merge_page(vec![msg(1, "a"), msg(2, "b")], PagePlacement::Latest);

        assert_eq!(thread.len(), 3);
        assert!(thread.entries()[2].is_pending());
        assert_eq!(ids(&thread), vec![1, 2]);
        assert_eq!(thread.next_history_offset(), 2);
    }
}
