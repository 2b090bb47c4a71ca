use std::sync::Arc;

use async_trait::async_trait;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, ChatAction, InputFile, MessageId, MessageReactionUpdated, ParseMode,
    ReactionType, ReplyParameters,
};
use teloxide::update_listeners::Polling;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::html::html_to_plain;
use crate::traits::{
    ChannelLifecycle, ChannelStatus, ChatEventHandler, DeliverySink, OutboundPhoto, OutboundText,
};
use memesmith_common::{ConversationId, Error, IncomingMessage, ReactionAdded, Result};

pub struct TelegramChannel {
    bot_token: String,
    display: String,
    status: ChannelStatus,
    handler: Arc<dyn ChatEventHandler>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl TelegramChannel {
    pub fn new(bot_token: String, handler: Arc<dyn ChatEventHandler>) -> Self {
        Self {
            bot_token,
            display: "Telegram".to_string(),
            status: ChannelStatus::Disconnected,
            handler,
            shutdown_tx: None,
        }
    }
}

/// Telegram "Group Anonymous Bot" ID used for anonymous admins.
const ANONYMOUS_BOT_ID: u64 = 1087968824;

/// Convert a Telegram message into an [`IncomingMessage`].
/// Returns None for messages without text or sent by other bots.
fn convert_message(msg: &teloxide::types::Message) -> Option<IncomingMessage> {
    let text = msg.text()?;
    // Channel posts have no sender.
    let user = msg.from.as_ref()?;

    // Ignore bots to prevent loops, but allow anonymous admins.
    if user.is_bot && user.id.0 != ANONYMOUS_BOT_ID {
        return None;
    }

    let mut incoming =
        IncomingMessage::text(msg.chat.id.0, msg.id.0 as i64, user.id.0 as i64, text);
    incoming.author_name = Some(
        user.username
            .clone()
            .unwrap_or_else(|| user.first_name.clone()),
    );
    if msg.chat.is_private() {
        incoming = incoming.direct();
    }
    if msg.forward_origin().is_some() {
        incoming = incoming.forwarded();
    }
    Some(incoming)
}

/// Emoji reactions present in the new set but not in the old one.
fn convert_reaction(update: &MessageReactionUpdated) -> Vec<ReactionAdded> {
    let before = emojis(&update.old_reaction);
    let user_id = update.user().map(|u| u.id.0 as i64);

    emojis(&update.new_reaction)
        .into_iter()
        .filter(|emoji| !before.contains(emoji))
        .map(|emoji| ReactionAdded {
            conversation_id: update.chat.id.0,
            message_id: update.message_id.0 as i64,
            user_id,
            emoji,
        })
        .collect()
}

fn emojis(reactions: &[ReactionType]) -> Vec<String> {
    reactions
        .iter()
        .filter_map(|r| match r {
            ReactionType::Emoji { emoji, .. } => Some(emoji.clone()),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl ChannelLifecycle for TelegramChannel {
    fn display_name(&self) -> &str {
        &self.display
    }

    async fn connect(&mut self) -> Result<()> {
        self.status = ChannelStatus::Connecting;
        let bot = Bot::new(&self.bot_token);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let on_message = Arc::clone(&self.handler);
        let on_reaction = Arc::clone(&self.handler);

        tokio::spawn(async move {
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(
                    move |msg: teloxide::types::Message| {
                        let on_message = Arc::clone(&on_message);
                        async move {
                            let Some(incoming) = convert_message(&msg) else {
                                return respond(());
                            };
                            debug!(
                                "telegram message {} in chat {} ({} chars)",
                                incoming.message_id,
                                incoming.conversation_id,
                                incoming.text.len()
                            );
                            let recorded = on_message.record_message(&incoming);
                            tokio::spawn(async move {
                                on_message.on_message(incoming, recorded).await
                            });
                            respond(())
                        }
                    },
                ))
                .branch(Update::filter_message_reaction_updated().endpoint(
                    move |update: MessageReactionUpdated| {
                        let on_reaction = Arc::clone(&on_reaction);
                        async move {
                            for reaction in convert_reaction(&update) {
                                debug!(
                                    "telegram reaction {} on message {} in chat {}",
                                    reaction.emoji,
                                    reaction.message_id,
                                    reaction.conversation_id
                                );
                                let on_reaction = Arc::clone(&on_reaction);
                                tokio::spawn(async move { on_reaction.on_reaction(reaction).await });
                            }
                            respond(())
                        }
                    },
                ));

            // Reaction updates are only delivered when requested explicitly.
            let listener = Polling::builder(bot.clone())
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::MessageReaction])
                .build();

            let mut dispatcher = Dispatcher::builder(bot, handler)
                .default_handler(|upd| async move {
                    tracing::trace!("unhandled update: {:?}", upd.kind);
                })
                .build();

            let token = dispatcher.shutdown_token();
            tokio::spawn(async move {
                let mut rx = shutdown_rx;
                while rx.changed().await.is_ok() {
                    if *rx.borrow() {
                        if let Err(e) = token.shutdown() {
                            warn!("telegram shutdown token error: {e:?}");
                        }
                        break;
                    }
                }
            });

            info!("telegram bot polling started");
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("telegram update listener error"),
                )
                .await;
            info!("telegram bot polling stopped");
        });

        self.status = ChannelStatus::Connected;
        info!("telegram channel connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        self.status = ChannelStatus::Disconnected;
        info!("telegram channel disconnected");
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }

    fn create_sender(&self) -> Arc<dyn DeliverySink> {
        Arc::new(TelegramSender::new(&self.bot_token))
    }
}

/// Sends notices and photos through the Bot API.
#[derive(Clone)]
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }
}

fn reply_parameters(reply_to: Option<i64>) -> Option<ReplyParameters> {
    let id = i32::try_from(reply_to?).ok()?;
    Some(ReplyParameters::new(MessageId(id)))
}

#[async_trait]
impl DeliverySink for TelegramSender {
    fn channel_type(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, message: &OutboundText) -> Result<()> {
        let chat_id = ChatId(message.conversation_id);

        let mut request = self
            .bot
            .send_message(chat_id, &message.html)
            .parse_mode(ParseMode::Html);
        if let Some(reply) = reply_parameters(message.reply_to) {
            request = request.reply_parameters(reply);
        }

        if let Err(e) = request.await {
            warn!("html send failed for chat {chat_id}, retrying as plain text: {e}");
            let mut plain = self.bot.send_message(chat_id, html_to_plain(&message.html));
            if let Some(reply) = reply_parameters(message.reply_to) {
                plain = plain.reply_parameters(reply);
            }
            plain
                .await
                .map_err(|e| Error::Channel(format!("telegram send failed: {e}")))?;
        }
        Ok(())
    }

    async fn send_photo(&self, photo: &OutboundPhoto) -> Result<()> {
        let chat_id = ChatId(photo.conversation_id);
        let _ = self
            .bot
            .send_chat_action(chat_id, ChatAction::UploadPhoto)
            .await;

        let mut request = self
            .bot
            .send_photo(chat_id, InputFile::file(photo.path.clone()))
            .caption(&photo.caption_html)
            .parse_mode(ParseMode::Html);
        if let Some(reply) = reply_parameters(photo.reply_to) {
            request = request.reply_parameters(reply);
        }

        request
            .await
            .map_err(|e| Error::Channel(format!("telegram photo send failed: {e}")))?;
        Ok(())
    }

    async fn send_typing(&self, conversation_id: ConversationId) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(conversation_id), ChatAction::Typing)
            .await
            .map_err(|e| Error::Channel(format!("telegram chat action failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memesmith_common::MessageOrigin;

    struct NoopHandler;

    #[async_trait]
    impl ChatEventHandler for NoopHandler {
        fn record_message(&self, _message: &IncomingMessage) -> bool {
            false
        }
        async fn on_message(&self, _message: IncomingMessage, _recorded: bool) {}
        async fn on_reaction(&self, _reaction: ReactionAdded) {}
    }

    fn message(json: &str) -> teloxide::types::Message {
        serde_json::from_str(json).expect("failed to parse json")
    }

    fn reaction(json: &str) -> MessageReactionUpdated {
        serde_json::from_str(json).expect("failed to parse json")
    }

    #[test]
    fn channel_starts_disconnected() {
        let channel = TelegramChannel::new("fake-token".to_string(), Arc::new(NoopHandler));
        assert_eq!(channel.display_name(), "Telegram");
        assert_eq!(channel.status(), ChannelStatus::Disconnected);
        assert_eq!(channel.create_sender().channel_type(), "telegram");
    }

    #[test]
    fn test_convert_message_private() {
        let msg = message(
            r#"{
            "message_id": 1,
            "date": 1620000000,
            "chat": {
                "id": 12345,
                "type": "private",
                "first_name": "Alice"
            },
            "from": {
                "id": 111,
                "is_bot": false,
                "first_name": "Alice",
                "username": "alice"
            },
            "text": "hello"
        }"#,
        );

        let incoming = convert_message(&msg).expect("should convert");
        assert_eq!(incoming.conversation_id, 12345);
        assert_eq!(incoming.message_id, 1);
        assert_eq!(incoming.author_id, 111);
        assert_eq!(incoming.author_name.as_deref(), Some("alice"));
        assert_eq!(incoming.text, "hello");
        assert!(incoming.is_direct);
        assert_eq!(incoming.origin, MessageOrigin::Authored);
    }

    #[test]
    fn test_convert_message_group_uses_first_name_without_username() {
        let msg = message(
            r#"{
            "message_id": 2,
            "date": 1620000000,
            "chat": {
                "id": -987654321,
                "type": "supergroup",
                "title": "My Group"
            },
            "from": {
                "id": 222,
                "is_bot": false,
                "first_name": "Bob"
            },
            "text": "hello group"
        }"#,
        );

        let incoming = convert_message(&msg).expect("should convert");
        assert_eq!(incoming.conversation_id, -987654321);
        assert_eq!(incoming.author_name.as_deref(), Some("Bob"));
        assert!(!incoming.is_direct);
    }

    #[test]
    fn test_convert_message_forwarded() {
        let msg = message(
            r#"{
            "message_id": 3,
            "date": 1620000000,
            "chat": {
                "id": -987654321,
                "type": "supergroup",
                "title": "My Group"
            },
            "from": {
                "id": 222,
                "is_bot": false,
                "first_name": "Bob"
            },
            "forward_origin": {
                "type": "user",
                "date": 1610000000,
                "sender_user": {
                    "id": 999,
                    "is_bot": false,
                    "first_name": "Carol"
                }
            },
            "text": "look at this"
        }"#,
        );

        let incoming = convert_message(&msg).expect("should convert");
        assert_eq!(incoming.origin, MessageOrigin::Forwarded);
    }

    #[test]
    fn test_convert_message_bot_ignored() {
        let msg = message(
            r#"{
            "message_id": 3,
            "date": 1620000000,
            "chat": {
                "id": 12345,
                "type": "private"
            },
            "from": {
                "id": 333,
                "is_bot": true,
                "first_name": "SomeBot"
            },
            "text": "I am a bot"
        }"#,
        );
        assert!(convert_message(&msg).is_none(), "should ignore bot messages");
    }

    #[test]
    fn test_convert_message_channel_post_ignored() {
        let msg = message(
            r#"{
            "message_id": 4,
            "date": 1620000000,
            "chat": {
                "id": -1001234567890,
                "type": "channel",
                "title": "My Channel"
            },
            "text": "channel post"
        }"#,
        );
        assert!(convert_message(&msg).is_none());
    }

    #[test]
    fn test_convert_reaction_reports_only_new_emoji() {
        let update = reaction(
            r#"{
            "chat": {
                "id": -987654321,
                "type": "supergroup",
                "title": "My Group"
            },
            "message_id": 42,
            "user": {
                "id": 222,
                "is_bot": false,
                "first_name": "Bob"
            },
            "date": 1620000000,
            "old_reaction": [{"type": "emoji", "emoji": "👍"}],
            "new_reaction": [
                {"type": "emoji", "emoji": "👍"},
                {"type": "emoji", "emoji": "🤡"}
            ]
        }"#,
        );

        let added = convert_reaction(&update);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].emoji, "🤡");
        assert_eq!(added[0].conversation_id, -987654321);
        assert_eq!(added[0].message_id, 42);
        assert_eq!(added[0].user_id, Some(222));
    }

    #[test]
    fn test_convert_reaction_removal_is_empty() {
        let update = reaction(
            r#"{
            "chat": {
                "id": 1,
                "type": "private",
                "first_name": "Alice"
            },
            "message_id": 7,
            "user": {
                "id": 1,
                "is_bot": false,
                "first_name": "Alice"
            },
            "date": 1620000000,
            "old_reaction": [{"type": "emoji", "emoji": "🔥"}],
            "new_reaction": []
        }"#,
        );
        assert!(convert_reaction(&update).is_empty());
    }

    #[test]
    fn reply_parameters_skip_out_of_range_ids() {
        assert!(reply_parameters(None).is_none());
        assert!(reply_parameters(Some(i64::MAX)).is_none());
        assert!(reply_parameters(Some(10)).is_some());
    }
}
