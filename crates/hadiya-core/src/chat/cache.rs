//! Per-conversation thread cache.
//!
//! Keeps the last reconciled [`MessageThread`] of recently closed sessions
//! so reopening a conversation shows messages immediately. Least recently
//! used conversations are evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use hadiya_types::ids::ConversationId;

use super::reconciler::MessageThread;

/// Shared handle used by the session manager and its sessions.
pub type SharedThreadCache = Arc<Mutex<ThreadCache>>;

#[derive(Debug)]
pub struct ThreadCache {
    capacity: usize,
    threads: HashMap<ConversationId, MessageThread>,
    /// Front = least recently used.
    order: VecDeque<ConversationId>,
}

impl ThreadCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            threads: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn shared(capacity: usize) -> SharedThreadCache {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// A copy of the cached thread, marking it most recently used.
    pub fn get(&mut self, conversation_id: ConversationId) -> Option<MessageThread> {
        let thread = self.threads.get(&conversation_id)?.clone();
        self.touch(conversation_id);
        Some(thread)
    }

    pub fn insert(&mut self, conversation_id: ConversationId, thread: MessageThread) {
        if self.capacity == 0 {
            return;
        }
        if self.threads.insert(conversation_id, thread).is_some() {
            self.touch(conversation_id);
            return;
        }
        self.order.push_back(conversation_id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.threads.remove(&evicted);
                tracing::debug!(conversation_id = %evicted, "evicted cached thread");
            }
        }
    }

    pub fn remove(&mut self, conversation_id: ConversationId) -> Option<MessageThread> {
        self.order.retain(|id| *id != conversation_id);
        self.threads.remove(&conversation_id)
    }

    fn touch(&mut self, conversation_id: ConversationId) {
        self.order.retain(|id| *id != conversation_id);
        self.order.push_back(conversation_id);
    }
}

/// Lock the shared cache. A poisoned lock still holds usable data.
pub fn lock(cache: &SharedThreadCache) -> MutexGuard<'_, ThreadCache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
