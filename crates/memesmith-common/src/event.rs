use serde::{Deserialize, Serialize};

/// Stable identifier of a chat thread or group.
pub type ConversationId = i64;

/// Where the text of an inbound message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Written by the sender in this conversation.
    Authored,
    /// Forwarded or relayed from somewhere else.
    Forwarded,
}

/// A new text message observed in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub conversation_id: ConversationId,
    pub message_id: i64,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub text: String,
    /// True for one-to-one conversations with the bot.
    pub is_direct: bool,
    pub origin: MessageOrigin,
}

impl IncomingMessage {
    pub fn text(
        conversation_id: ConversationId,
        message_id: i64,
        author_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            message_id,
            author_id,
            author_name: None,
            text: text.into(),
            is_direct: false,
            origin: MessageOrigin::Authored,
        }
    }

    pub fn direct(mut self) -> Self {
        self.is_direct = true;
        self
    }

    pub fn forwarded(mut self) -> Self {
        self.origin = MessageOrigin::Forwarded;
        self
    }

    /// Chat type label used for metrics and logs.
    pub fn chat_kind(&self) -> &'static str {
        if self.is_direct { "private" } else { "group" }
    }
}

/// An emoji reaction added to an existing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionAdded {
    pub conversation_id: ConversationId,
    pub message_id: i64,
    pub user_id: Option<i64>,
    pub emoji: String,
}
