use std::collections::VecDeque;

use dashmap::DashMap;
use memesmith_common::{ConversationId, MessageOrigin};

/// One remembered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub message_id: i64,
    pub author_id: i64,
    pub text: String,
}

/// Rolling window of recent text messages, kept separately per conversation.
///
/// Each conversation holds at most `capacity` entries; adding to a full window
/// evicts the oldest one. Conversations are sharded in a [`DashMap`], so writers
/// in different conversations do not contend, and no lock is held across an
/// `.await`.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    chats: DashMap<ConversationId, VecDeque<HistoryEntry>>,
}

impl HistoryBuffer {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            chats: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remember a message. Returns false when it was ignored (blank or forwarded).
    pub fn add(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
        author_id: i64,
        text: &str,
        origin: MessageOrigin,
    ) -> bool {
        if text.trim().is_empty() || origin == MessageOrigin::Forwarded {
            return false;
        }

        let mut window = self
            .chats
            .entry(conversation_id)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(HistoryEntry {
            message_id,
            author_id,
            text: text.to_string(),
        });
        true
    }

    /// Text of a remembered message, or an empty string when it is not in the window.
    pub fn get_text(&self, conversation_id: ConversationId, message_id: i64) -> String {
        self.chats
            .get(&conversation_id)
            .and_then(|window| {
                window
                    .iter()
                    .find(|entry| entry.message_id == message_id)
                    .map(|entry| entry.text.clone())
            })
            .unwrap_or_default()
    }

    /// The window formatted as `"User {author_id}: {text}"`, oldest first.
    pub fn get_context(&self, conversation_id: ConversationId) -> Vec<String> {
        self.chats
            .get(&conversation_id)
            .map(|window| {
                window
                    .iter()
                    .map(|entry| format!("User {}: {}", entry.author_id, entry.text))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&self, conversation_id: ConversationId) {
        if let Some(mut window) = self.chats.get_mut(&conversation_id) {
            window.clear();
        }
    }

    /// Number of entries held for one conversation.
    pub fn len(&self, conversation_id: ConversationId) -> usize {
        self.chats
            .get(&conversation_id)
            .map(|window| window.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, conversation_id: ConversationId) -> bool {
        self.len(conversation_id) == 0
    }

    /// Conversations that have stored at least one message.
    pub fn conversation_count(&self) -> usize {
        self.chats.len()
    }
}
