pub mod fake;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::NetworkError;
use crate::model::{ChatMessage, ChatSnapshot, SamplingParams};

/// One completion request: the configured conversation plus the case prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

impl ChatRequest {
    /// The chat's messages, in order, followed by `input` as the user turn.
    pub fn for_case(chat: &ChatSnapshot, input: &str) -> Self {
        let mut messages = chat.messages.clone();
        messages.push(ChatMessage::new("user", input));
        Self {
            model: chat.model.clone(),
            messages,
            sampling: chat.sampling.clone(),
        }
    }

    /// Content of the last user message.
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, NetworkError>;

    fn provider_name(&self) -> &'static str;

    /// Release the underlying connection pool. Later calls fail with `Closed`.
    fn close(&self) {}

    fn is_closed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_prompt_is_appended_after_configured_messages() {
        let chat = ChatSnapshot {
            config_id: 1,
            identifier: "c".into(),
            endpoint: "fake://echo".into(),
            api_key: String::new(),
            model: "m".into(),
            messages: vec![
                ChatMessage::new("system", "You are a diagnostician."),
                ChatMessage::new("user", "Reply with a numbered list."),
            ],
            sampling: SamplingParams::default(),
        };
        let req = ChatRequest::for_case(&chat, "65 y/o smoker, dyspnea");
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.prompt(), "65 y/o smoker, dyspnea");
    }
}
