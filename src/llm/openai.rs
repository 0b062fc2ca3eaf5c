//! OpenAI-compatible chat-completions provider.
//!
//! Works against any endpoint speaking the `/chat/completions` shape,
//! which covers OpenAI, Azure and most local gateways.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use webscout_agent::prompt::{format_correction, format_user_message, SYSTEM_PROMPT};
use webscout_agent::{parse_agent_output, AgentError, AgentOutput, DecideRequest, LlmProvider};

use crate::config::LlmSettings;

pub struct OpenAiProvider {
    settings: LlmSettings,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, AgentError> {
        let request = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages,
        };
        let url = format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AgentError::execution(format!("llm request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::execution(format!(
                "llm returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| AgentError::execution(format!("llm response unreadable: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AgentError::execution("llm returned no choices"))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn decide(&self, request: DecideRequest<'_>) -> Result<AgentOutput, AgentError> {
        let mut user = format_user_message(
            request.task,
            request.state,
            request.history,
            request.history_window,
        );
        if let Some(correction) = request.correction {
            user.push_str(&format_correction(correction));
        }

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user),
        ];
        if let Some(shot) = &request.state.screenshot_base64 {
            debug!(bytes = shot.len(), "attaching screenshot reference");
            messages.push(ChatMessage::user(format!(
                "Screenshot (base64 PNG, truncated): {}",
                &shot[..shot.len().min(64)]
            )));
        }

        // Transport errors surface as planning failures so the loop's
        // single corrective retry also covers flaky calls.
        let content = self
            .chat(messages)
            .await
            .map_err(|err| AgentError::planning(err.to_string()))?;
        parse_agent_output(&content)
    }

    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        self.chat(vec![ChatMessage::user(prompt)]).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_openai_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.6,
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn chat_response_parses_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }
}
