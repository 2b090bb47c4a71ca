use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::contract::{ContractError, MemeIdea, idea_schema, parse_meme_idea};
use crate::providers::{ChatMessage, LlmProvider, LlmRequest};

const SYSTEM_PROMPT: &str = "You are a meme expert. Answer with JSON only.";

/// Why no idea was produced for a trigger.
#[derive(Debug, thiserror::Error)]
pub enum IdeaError {
    /// The provider call itself failed (network, HTTP status, timeout).
    #[error("provider failed: {0}")]
    Provider(String),

    /// The provider answered but the answer broke the JSON contract.
    #[error("unusable model response: {0}")]
    Contract(#[from] ContractError),

    /// The model judged the conversation not worth a meme.
    #[error("conversation is not memable")]
    NotMemable,
}

impl IdeaError {
    /// True for failures the user should hear about.
    pub fn is_hard_failure(&self) -> bool {
        !matches!(self, IdeaError::NotMemable)
    }
}

/// Turns conversation context into a [`MemeIdea`].
#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &[String],
        triggered_text: &str,
        reaction_semantics: Option<&str>,
    ) -> Result<MemeIdea, IdeaError>;
}

/// Idea generator backed by a chat-completion provider.
pub struct LlmIdeaGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f64>,
}

impl LlmIdeaGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn build_request(
        &self,
        context: &[String],
        triggered_text: &str,
        reaction_semantics: Option<&str>,
    ) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(build_prompt(
                context,
                triggered_text,
                reaction_semantics,
            ))],
            system: Some(SYSTEM_PROMPT.to_string()),
            max_tokens: Some(400),
            temperature: self.temperature,
            json_mode: true,
        }
    }
}

#[async_trait]
impl IdeaGenerator for LlmIdeaGenerator {
    async fn generate(
        &self,
        context: &[String],
        triggered_text: &str,
        reaction_semantics: Option<&str>,
    ) -> Result<MemeIdea, IdeaError> {
        let request = self.build_request(context, triggered_text, reaction_semantics);

        let response = self.provider.complete(&request).await.map_err(|e| {
            warn!(provider = self.provider.provider_id(), "idea request failed: {e}");
            IdeaError::Provider(e.to_string())
        })?;

        let idea = parse_meme_idea(&response.content).map_err(|e| {
            let preview: String = response.content.chars().take(200).collect();
            warn!(
                provider = self.provider.provider_id(),
                "model response broke the idea contract: {e}; response starts with: {preview}"
            );
            IdeaError::Contract(e)
        })?;

        if !idea.is_memable {
            debug!("model decided the conversation is not memable");
            return Err(IdeaError::NotMemable);
        }

        Ok(idea)
    }
}

/// Offline generator that always returns the same idea.
pub struct FixedIdeaGenerator {
    idea: MemeIdea,
}

impl FixedIdeaGenerator {
    pub fn new(idea: MemeIdea) -> Self {
        Self { idea }
    }
}

impl Default for FixedIdeaGenerator {
    fn default() -> Self {
        Self::new(MemeIdea {
            is_memable: true,
            top_text: "When you drop a reaction".to_string(),
            bottom_text: "And the bot makes a meme instantly".to_string(),
            search_query: "surprised monkey".to_string(),
        })
    }
}

#[async_trait]
impl IdeaGenerator for FixedIdeaGenerator {
    async fn generate(
        &self,
        _context: &[String],
        _triggered_text: &str,
        _reaction_semantics: Option<&str>,
    ) -> Result<MemeIdea, IdeaError> {
        info!("idea generator running in mock mode");
        if !self.idea.is_memable {
            return Err(IdeaError::NotMemable);
        }
        Ok(self.idea.clone())
    }
}

/// Build the user prompt for one trigger.
pub fn build_prompt(
    context: &[String],
    triggered_text: &str,
    reaction_semantics: Option<&str>,
) -> String {
    let history = context.join("\n");
    let schema = idea_schema();

    let mut prompt = format!(
        "You generate memes for group chats. You are given the recent conversation.\n\
         The message that triggered you is: \"{triggered_text}\".\n\n\
         CONVERSATION (including the trigger message):\n---\n{history}\n---\n\n\
         Your task:\n\
         1. Decide whether this conversation can become a funny meme.\n\
         2. If it can, write a top caption and a bottom caption in the language of the conversation.\n\
         3. Write a VERY SHORT, literal search query for a fitting meme template image \
         (for example \"sad keanu reeves\", \"two guys shaking hands\").\n"
    );

    if let Some(meaning) = reaction_semantics {
        prompt.push_str(&format!(
            "4. The user reacted with an emoji meaning \"{meaning}\". \
             The captions should carry that tone.\n"
        ));
    }

    prompt.push_str(&format!(
        "Reply with a single JSON object matching this schema:\n{schema}\n"
    ));
    prompt
}
