use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use memesmith_common::{ConversationId, IncomingMessage, ReactionAdded, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle management for a chat transport (connect, disconnect, status).
#[async_trait]
pub trait ChannelLifecycle: Send {
    /// Human-readable display name.
    fn display_name(&self) -> &str;

    /// Start receiving events from the external service.
    async fn connect(&mut self) -> Result<()>;

    /// Gracefully stop receiving events.
    async fn disconnect(&mut self) -> Result<()>;

    fn status(&self) -> ChannelStatus;

    /// Create a send-only handle that outlives the polling loop.
    fn create_sender(&self) -> Arc<dyn DeliverySink>;
}

/// Receives inbound events from a channel.
///
/// `record_message` runs inline on the transport's update loop, so messages
/// of one chat are recorded in arrival order. The async callbacks each run in
/// their own task and may interleave.
#[async_trait]
pub trait ChatEventHandler: Send + Sync {
    /// Returns whether the message was stored.
    fn record_message(&self, message: &IncomingMessage) -> bool;

    /// Follow-up work for a message already passed to `record_message`.
    async fn on_message(&self, message: IncomingMessage, recorded: bool);

    async fn on_reaction(&self, reaction: ReactionAdded);
}

/// A text notice, formatted as Telegram-flavoured HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundText {
    pub conversation_id: ConversationId,
    pub html: String,
    pub reply_to: Option<i64>,
}

impl OutboundText {
    pub fn new(conversation_id: ConversationId, html: impl Into<String>) -> Self {
        Self {
            conversation_id,
            html: html.into(),
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// A rendered image on local disk plus its caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPhoto {
    pub conversation_id: ConversationId,
    pub path: PathBuf,
    pub caption_html: String,
    pub reply_to: Option<i64>,
}

/// Send-only interface for delivering replies.
///
/// Shared via `Arc` across every trigger task.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    fn channel_type(&self) -> &str;

    async fn send_text(&self, message: &OutboundText) -> Result<()>;

    async fn send_photo(&self, photo: &OutboundPhoto) -> Result<()>;

    /// Show a "typing" hint. Best-effort; the default does nothing.
    async fn send_typing(&self, _conversation_id: ConversationId) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_text_builder_sets_reply() {
        let text = OutboundText::new(5, "<b>hi</b>").reply_to(9);
        assert_eq!(text.conversation_id, 5);
        assert_eq!(text.html, "<b>hi</b>");
        assert_eq!(text.reply_to, Some(9));
    }

    #[test]
    fn status_round_trips_through_json() {
        let status = ChannelStatus::Error("token rejected".into());
        let json = serde_json::to_string(&status).unwrap();
        let back: ChannelStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
