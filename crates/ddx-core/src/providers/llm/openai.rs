use super::{ChatRequest, LlmClient, LlmResponse};
use crate::errors::NetworkError;
use crate::model::{ChatSnapshot, SamplingParams};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::RwLock;
use std::time::Duration;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAIClient {
    url: String,
    api_key: String,
    model: String,
    client: RwLock<Option<reqwest::Client>>,
}

impl OpenAIClient {
    pub fn new(chat: &ChatSnapshot, timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NetworkError::from)?;
        Ok(Self {
            url: completions_url(&chat.endpoint),
            api_key: chat.api_key.clone(),
            model: chat.model.clone(),
            client: RwLock::new(Some(client)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn http(&self) -> Result<reqwest::Client, NetworkError> {
        let guard = match self.client.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| NetworkError::closed(format!("client for {} was closed", self.url)))
    }
}

fn completions_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    }
}

/// Request body with only the sampling parameters that are set.
pub(crate) fn request_body(request: &ChatRequest) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(request.model));
    body.insert("messages".into(), json!(request.messages));
    insert_sampling(&mut body, &request.sampling);
    Value::Object(body)
}

fn insert_sampling(body: &mut Map<String, Value>, s: &SamplingParams) {
    if let Some(v) = s.frequency_penalty {
        body.insert("frequency_penalty".into(), json!(v));
    }
    if let Some(v) = s.max_tokens {
        body.insert("max_tokens".into(), json!(v));
    }
    if let Some(v) = s.presence_penalty {
        body.insert("presence_penalty".into(), json!(v));
    }
    if let Some(v) = s.temperature {
        body.insert("temperature".into(), json!(v));
    }
    if let Some(v) = s.top_p {
        body.insert("top_p".into(), json!(v));
    }
    if !s.logit_bias.is_empty() {
        let map: Map<String, Value> = s
            .logit_bias
            .iter()
            .map(|lb| (lb.token.clone(), json!(lb.bias)))
            .collect();
        body.insert("logit_bias".into(), Value::Object(map));
    }
    if let Some(user) = &s.user {
        body.insert("user".into(), json!(user));
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, NetworkError> {
        let http = self.http()?;

        let body = request_body(request);
        let mut req = http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(NetworkError::from_status(status.as_u16(), error_text)
                .with_provider(self.provider_name()));
        }

        let json: Value = resp.json().await?;

        // choices[0].message.content
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                NetworkError::malformed("response missing choices[0].message.content")
                    .with_provider(self.provider_name())
            })?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: self.provider_name().to_string(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn close(&self) {
        let mut guard = match self.client.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    fn is_closed(&self) -> bool {
        match self.client.read() {
            Ok(g) => g.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkErrorKind;
    use crate::model::{ChatMessage, LogitBias};

    fn chat(endpoint: &str) -> ChatSnapshot {
        ChatSnapshot {
            config_id: 7,
            identifier: "gpt".into(),
            endpoint: endpoint.into(),
            api_key: "test-key".into(),
            model: "gpt-4o-mini".into(),
            messages: vec![ChatMessage::new("system", "List diagnoses.")],
            sampling: SamplingParams {
                temperature: Some(0.0),
                logit_bias: vec![LogitBias {
                    token: "50256".into(),
                    bias: -100,
                }],
                ..Default::default()
            },
        }
    }

    #[test]
    fn url_is_derived_from_endpoint() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn body_omits_unset_sampling_parameters() {
        let req = ChatRequest::for_case(&chat("https://x/v1"), "cough");
        let body = request_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][1]["content"], "cough");
        assert!(body["messages"][0].get("name").is_none());
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["logit_bias"]["50256"], -100);
        for absent in ["top_p", "max_tokens", "presence_penalty", "frequency_penalty", "user"] {
            assert!(body.get(absent).is_none(), "{} should be omitted", absent);
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let snap = chat("http://127.0.0.1:9/v1");
        let client = OpenAIClient::new(&snap, Duration::from_secs(2)).unwrap();
        let req = ChatRequest::for_case(&snap, "hello");
        let err = client.complete(&req).await.unwrap_err();
        assert!(
            matches!(err.kind, NetworkErrorKind::Transport | NetworkErrorKind::Timeout),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn closed_client_refuses_requests() {
        let client = OpenAIClient::new(&chat("https://api.openai.com/v1"), Duration::from_secs(5))
            .unwrap();
        assert!(!client.is_closed());
        client.close();
        assert!(client.is_closed());
        let req = ChatRequest::for_case(&chat("https://api.openai.com/v1"), "hello");
        let err = client.complete(&req).await.unwrap_err();
        assert_eq!(err.kind, NetworkErrorKind::Closed);
    }
}
