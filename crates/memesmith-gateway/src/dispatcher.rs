use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use memesmith_agents::IdeaGenerator;
use memesmith_channels::{
    ChatEventHandler, DeliverySink, OutboundPhoto, OutboundText, escape_html, meme_caption,
};
use memesmith_common::{ConversationId, IncomingMessage, ReactionAdded};
use memesmith_config::{AppConfig, ReactionTrigger};
use memesmith_db::{ActivityLog, GenerationRecord};
use memesmith_media::{OverlayRenderer, RenderRequest, TemplateFetcher};
use tracing::{debug, info, warn};

use crate::history::HistoryBuffer;
use crate::metrics::Metrics;

/// Caption label for memes started by a private message.
pub const DIRECT_TRIGGER: &str = "💬";

const IDEA_FAILED_NOTICE: &str = "My meme brain short-circuited. Try again in a bit.";
const RENDER_FAILED_NOTICE: &str = "Couldn't build an image from the template.";
const DELIVERY_FAILED_NOTICE: &str = "Failed to send the meme. The file may be too large.";
const MISSING_MESSAGE_NOTICE: &str =
    "I can't see that message anymore. I only remember the last few messages in this chat.";

/// Why a triggered pipeline stopped before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Nothing remembered for the conversation.
    NoContext,
    /// The reacted-to message is not in the history window.
    MessageNotFound,
    IdeaFailed,
    NotMemable,
    TemplateNotFound,
    RenderFailed,
    DeliveryFailed,
}

impl AbortReason {
    /// Label used for metrics and the activity log.
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::NoContext => "no_context",
            AbortReason::MessageNotFound => "message_not_found",
            AbortReason::IdeaFailed => "idea_failed",
            AbortReason::NotMemable => "not_memable",
            AbortReason::TemplateNotFound => "template_not_found",
            AbortReason::RenderFailed => "render_failed",
            AbortReason::DeliveryFailed => "delivery_failed",
        }
    }
}

/// Result of one triggered invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Delivered,
    Aborted(AbortReason),
}

/// Knobs the dispatcher reads on every trigger.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub triggers: Vec<ReactionTrigger>,
    /// Appended to the idea's search query.
    pub query_suffix: String,
    /// Directory for rendered images awaiting delivery.
    pub work_dir: PathBuf,
    pub notify_missing_message: bool,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            triggers: config.triggers.reactions.clone(),
            query_suffix: config.search.query_suffix.clone(),
            work_dir: config.media.resolved_work_dir(),
            notify_missing_message: config.triggers.notify_missing_message,
        }
    }

    fn trigger_for(&self, emoji: &str) -> Option<&ReactionTrigger> {
        let wanted = strip_variation(emoji);
        self.triggers
            .iter()
            .find(|t| strip_variation(&t.emoji) == wanted)
    }
}

/// Emoji clients may append U+FE0F; treat both spellings as one symbol.
fn strip_variation(emoji: &str) -> &str {
    emoji.trim_end_matches('\u{fe0f}')
}

/// Who and what started a pipeline run.
struct Trigger<'a> {
    conversation_id: ConversationId,
    message_id: i64,
    user_id: Option<i64>,
    label: &'a str,
    semantics: Option<&'a str>,
}

struct Abort {
    reason: AbortReason,
    detail: String,
}

impl Abort {
    fn new(reason: AbortReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Removes the rendered file once delivery is over, whatever the outcome.
struct TempFile(PathBuf);

impl TempFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove {}: {e}", self.0.display());
            }
        }
    }
}

/// Turns inbound chat events into meme replies.
///
/// Every event updates the history window; configured reactions and private
/// messages then drive idea generation, template lookup, rendering and
/// delivery. Each stage can abort the run; user-facing notices are sent for
/// failures a user can act on, and nothing is retried.
pub struct TriggerDispatcher {
    history: Arc<HistoryBuffer>,
    ideas: Arc<dyn IdeaGenerator>,
    templates: Arc<TemplateFetcher>,
    renderer: Arc<OverlayRenderer>,
    sink: Arc<dyn DeliverySink>,
    settings: DispatchSettings,
    metrics: Option<Arc<Metrics>>,
    activity: Option<Arc<dyn ActivityLog>>,
    invocations: AtomicU64,
}

impl TriggerDispatcher {
    pub fn new(
        history: Arc<HistoryBuffer>,
        ideas: Arc<dyn IdeaGenerator>,
        templates: Arc<TemplateFetcher>,
        renderer: Arc<OverlayRenderer>,
        sink: Arc<dyn DeliverySink>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            history,
            ideas,
            templates,
            renderer,
            sink,
            settings,
            metrics: None,
            activity: None,
            invocations: AtomicU64::new(0),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Record a message and, in private chats, run the pipeline on it.
    ///
    /// Returns `None` when the message did not trigger anything.
    pub async fn handle_message(&self, message: IncomingMessage) -> Option<PipelineOutcome> {
        let stored = self.record(&message);
        self.respond(message, stored).await
    }

    /// Count a message and add it to the history window.
    ///
    /// Synchronous so the transport can call it in arrival order before
    /// spawning the rest of the work. Commands are never stored. Returns
    /// whether the message entered the window.
    pub fn record(&self, message: &IncomingMessage) -> bool {
        if parse_command(&message.text).is_some() {
            return false;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_message(message.chat_kind());
        }

        let stored = self.history.add(
            message.conversation_id,
            message.message_id,
            message.author_id,
            &message.text,
            message.origin,
        );
        if stored {
            if let Some(metrics) = &self.metrics {
                metrics.set_active_chats(self.history.conversation_count());
            }
        }
        stored
    }

    /// Async follow-up for a message already passed to [`record`](Self::record):
    /// command replies, the activity log and the private-chat pipeline.
    pub async fn respond(
        &self,
        message: IncomingMessage,
        stored: bool,
    ) -> Option<PipelineOutcome> {
        let conversation_id = message.conversation_id;

        if let Some(command) = parse_command(&message.text) {
            if message.is_direct && matches!(command.as_str(), "start" | "help") {
                self.send_notice(OutboundText::new(conversation_id, self.help_text()))
                    .await;
            }
            return None;
        }

        if stored {
            if let Some(activity) = &self.activity {
                if let Err(e) = activity
                    .record_message(
                        conversation_id,
                        message.message_id,
                        Some(message.author_id),
                        message.author_name.as_deref(),
                        &message.text,
                    )
                    .await
                {
                    warn!("failed to record message in activity log: {e}");
                }
            }
        }

        if !message.is_direct || message.text.trim().is_empty() {
            return None;
        }

        let context = self.history.get_context(conversation_id);
        if context.is_empty() {
            debug!("no context for direct message in chat {conversation_id}");
            return Some(PipelineOutcome::Aborted(AbortReason::NoContext));
        }

        let trigger = Trigger {
            conversation_id,
            message_id: message.message_id,
            user_id: Some(message.author_id),
            label: DIRECT_TRIGGER,
            semantics: None,
        };
        Some(self.run_pipeline(trigger, context, message.text).await)
    }

    /// Run the pipeline when a configured reaction lands on a remembered message.
    ///
    /// Returns `None` for reactions that are not triggers.
    pub async fn handle_reaction(&self, reaction: ReactionAdded) -> Option<PipelineOutcome> {
        if let Some(metrics) = &self.metrics {
            metrics.record_reaction(&reaction.emoji);
        }

        let trigger = self.settings.trigger_for(&reaction.emoji)?;
        let conversation_id = reaction.conversation_id;

        let context = self.history.get_context(conversation_id);
        if context.is_empty() {
            debug!("reaction in chat {conversation_id} but nothing remembered");
            return Some(PipelineOutcome::Aborted(AbortReason::NoContext));
        }

        let triggered_text = self.history.get_text(conversation_id, reaction.message_id);
        if triggered_text.is_empty() {
            debug!(
                "message {} in chat {conversation_id} is outside the history window",
                reaction.message_id
            );
            if self.settings.notify_missing_message {
                self.send_notice(
                    OutboundText::new(conversation_id, MISSING_MESSAGE_NOTICE)
                        .reply_to(reaction.message_id),
                )
                .await;
            }
            return Some(PipelineOutcome::Aborted(AbortReason::MessageNotFound));
        }

        info!(
            "{} reaction on message {} in chat {conversation_id} triggers a meme",
            reaction.emoji, reaction.message_id
        );
        let trigger = Trigger {
            conversation_id,
            message_id: reaction.message_id,
            user_id: reaction.user_id,
            label: &trigger.emoji,
            semantics: Some(&trigger.meaning),
        };
        Some(self.run_pipeline(trigger, context, triggered_text).await)
    }

    async fn run_pipeline(
        &self,
        trigger: Trigger<'_>,
        context: Vec<String>,
        triggered_text: String,
    ) -> PipelineOutcome {
        let started = Instant::now();
        let mut search_query = String::new();

        let result = self
            .drive(&trigger, &context, &triggered_text, &mut search_query)
            .await;
        let elapsed = started.elapsed();
        self.observe("total", elapsed);

        let (outcome, error_message) = match result {
            Ok(()) => (PipelineOutcome::Delivered, None),
            Err(abort) => {
                info!(
                    "pipeline for chat {} stopped: {} ({})",
                    trigger.conversation_id,
                    abort.reason.as_str(),
                    abort.detail
                );
                (PipelineOutcome::Aborted(abort.reason), Some(abort.detail))
            }
        };

        let status = match outcome {
            PipelineOutcome::Delivered => "success",
            PipelineOutcome::Aborted(reason) => reason.as_str(),
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_generation(status, trigger.label);
        }

        if let Some(activity) = &self.activity {
            let record = GenerationRecord {
                chat_id: trigger.conversation_id,
                user_id: trigger.user_id,
                trigger: Some(trigger.label.to_string()),
                search_query,
                success: outcome == PipelineOutcome::Delivered,
                error_message,
                duration_secs: Some(elapsed.as_secs_f64()),
            };
            if let Err(e) = activity.record_generation(record).await {
                warn!("failed to record generation in activity log: {e}");
            }
        }

        outcome
    }

    async fn drive(
        &self,
        trigger: &Trigger<'_>,
        context: &[String],
        triggered_text: &str,
        search_query: &mut String,
    ) -> Result<(), Abort> {
        let conversation_id = trigger.conversation_id;

        if let Err(e) = self.sink.send_typing(conversation_id).await {
            debug!("typing indicator failed for chat {conversation_id}: {e}");
        }

        let stage = Instant::now();
        let generated = self
            .ideas
            .generate(context, triggered_text, trigger.semantics)
            .await;
        self.observe("idea", stage.elapsed());

        let idea = match generated {
            Ok(idea) => {
                self.api_call("llm", "ok");
                idea
            }
            Err(e) if !e.is_hard_failure() => {
                self.api_call("llm", "ok");
                return Err(Abort::new(AbortReason::NotMemable, e.to_string()));
            }
            Err(e) => {
                self.api_call("llm", "error");
                warn!("idea generation failed for chat {conversation_id}: {e}");
                self.send_notice(
                    OutboundText::new(conversation_id, IDEA_FAILED_NOTICE)
                        .reply_to(trigger.message_id),
                )
                .await;
                return Err(Abort::new(AbortReason::IdeaFailed, e.to_string()));
            }
        };
        *search_query = idea.search_query.clone();

        let query = format!("{}{}", idea.search_query.trim(), self.settings.query_suffix);
        let stage = Instant::now();
        let found = self.templates.fetch(&query).await;
        self.observe("search", stage.elapsed());

        let Some(template_url) = found else {
            self.api_call("search", "not_found");
            self.send_notice(OutboundText::new(
                conversation_id,
                format!(
                    "Sorry, couldn't find a template for: <b>{}</b>",
                    escape_html(&idea.search_query)
                ),
            ))
            .await;
            return Err(Abort::new(
                AbortReason::TemplateNotFound,
                format!("no template for '{query}'"),
            ));
        };
        self.api_call("search", "ok");

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.work_dir).await {
            warn!(
                "cannot create work dir {}: {e}",
                self.settings.work_dir.display()
            );
        }
        let output = TempFile(self.output_path(conversation_id, trigger.message_id));
        let request = RenderRequest {
            template_url,
            top_text: idea.top_text.clone(),
            bottom_text: idea.bottom_text.clone(),
            output_path: output.path().to_path_buf(),
        };

        let stage = Instant::now();
        let rendered = self.renderer.create_meme(&request).await;
        self.observe("render", stage.elapsed());

        let path = match rendered {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    "render failed for chat {conversation_id} ({}): {e}",
                    request.template_url
                );
                self.send_notice(
                    OutboundText::new(conversation_id, RENDER_FAILED_NOTICE)
                        .reply_to(trigger.message_id),
                )
                .await;
                return Err(Abort::new(AbortReason::RenderFailed, e.to_string()));
            }
        };

        let photo = OutboundPhoto {
            conversation_id,
            path,
            caption_html: meme_caption(&idea.top_text, &idea.bottom_text, trigger.label),
            reply_to: Some(trigger.message_id),
        };
        let stage = Instant::now();
        let sent = self.sink.send_photo(&photo).await;
        self.observe("delivery", stage.elapsed());

        if let Err(e) = sent {
            warn!("meme delivery failed for chat {conversation_id}: {e}");
            self.send_notice(
                OutboundText::new(conversation_id, DELIVERY_FAILED_NOTICE)
                    .reply_to(trigger.message_id),
            )
            .await;
            return Err(Abort::new(AbortReason::DeliveryFailed, e.to_string()));
        }

        info!("meme delivered to chat {conversation_id}");
        Ok(())
    }

    fn output_path(&self, conversation_id: ConversationId, message_id: i64) -> PathBuf {
        let n = self.invocations.fetch_add(1, Ordering::Relaxed);
        self.settings
            .work_dir
            .join(format!("meme_{conversation_id}_{message_id}_{n}.jpg"))
    }

    async fn send_notice(&self, notice: OutboundText) {
        if let Err(e) = self.sink.send_text(&notice).await {
            warn!(
                "failed to send notice to chat {}: {e}",
                notice.conversation_id
            );
        }
    }

    fn observe(&self, stage: &str, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_stage(stage, elapsed);
        }
    }

    fn api_call(&self, service: &str, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_api_call(service, status);
        }
    }

    fn help_text(&self) -> String {
        let emojis: Vec<&str> = self
            .settings
            .triggers
            .iter()
            .map(|t| t.emoji.as_str())
            .collect();
        format!(
            "Hi! I'm a meme generator bot.\n\n\
             Add me to a group chat and react with {} to any message, \
             and I'll turn the conversation into a meme.\n\
             In a private chat, just send me some text.",
            emojis.join(" or ")
        )
    }
}

#[async_trait]
impl ChatEventHandler for TriggerDispatcher {
    fn record_message(&self, message: &IncomingMessage) -> bool {
        self.record(message)
    }

    async fn on_message(&self, message: IncomingMessage, recorded: bool) {
        self.respond(message, recorded).await;
    }

    async fn on_reaction(&self, reaction: ReactionAdded) {
        self.handle_reaction(reaction).await;
    }
}

/// Command name of a `/command` message, lowercased and without any `@bot` suffix.
fn parse_command(text: &str) -> Option<String> {
    let rest = text.trim_start().strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}
