use std::time::Duration;

use crate::providers::{ChatMessage, ChatRole, LlmProvider, LlmRequest, LlmResponse, Usage};
use async_trait::async_trait;
use memesmith_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for OpenAI-compatible chat completion APIs (OpenRouter included).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    provider_id: String,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            provider_id: "openai".to_string(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = id.into();
        self
    }

    /// Attach a header sent with every request (OpenRouter attribution headers).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        for (name, value) in &self.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let openai_request = convert_request(request);

        let response = self
            .post(&url)
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                Error::Agent(format!("{} request failed: {}", self.provider_id, e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!(
                "{} API error ({status}): {}",
                self.provider_id,
                truncate(&error_text, 300)
            )));
        }

        let openai_response: OpenAiResponse = response.json().await.map_err(|e| {
            Error::Agent(format!("failed to parse {} response: {e}", self.provider_id))
        })?;

        convert_response(openai_response)
    }
}

fn convert_request(request: &LlmRequest) -> OpenAiRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system_prompt) = &request.system {
        messages.push(OpenAiMessage {
            role: "system",
            content: system_prompt.clone(),
        });
    }

    messages.extend(request.messages.iter().map(convert_message));

    OpenAiRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        response_format: request.json_mode.then_some(OpenAiResponseFormat {
            kind: "json_object",
        }),
    }
}

fn convert_message(msg: &ChatMessage) -> OpenAiMessage {
    let role = match msg.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    };
    OpenAiMessage {
        role,
        content: msg.content.clone(),
    }
}

fn convert_response(response: OpenAiResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Agent("no choices in response".to_string()))?;

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        stop_reason: choice.finish_reason,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

// Request Types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

// Response Types
#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_sets_response_format() {
        let request = LlmRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            system: Some("sys".into()),
            max_tokens: None,
            temperature: None,
            json_mode: true,
        };
        let body = serde_json::to_value(convert_request(&request)).expect("serialize");

        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn plain_mode_omits_response_format() {
        let request = LlmRequest {
            model: "m".into(),
            messages: vec![],
            system: None,
            max_tokens: Some(10),
            temperature: Some(0.5),
            json_mode: false,
        };
        let body = serde_json::to_value(convert_request(&request)).expect("serialize");
        assert!(body.get("response_format").is_none());
        assert_eq!(body["max_tokens"], 10);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("привет", 3), "при…");
        assert_eq!(truncate("ok", 3), "ok");
    }
}
