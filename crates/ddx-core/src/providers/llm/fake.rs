use super::{ChatRequest, LlmClient, LlmResponse};
use crate::errors::NetworkError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Offline client. Without a scripted answer it echoes the case prompt back.
#[derive(Debug, Default)]
pub struct FakeClient {
    model: String,
    fixed_response: Option<String>,
    by_prompt: HashMap<String, String>,
    failures: HashMap<String, NetworkError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    closed: AtomicBool,
}

impl FakeClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Answer `prompt` with `response`, ahead of any fixed response.
    pub fn with_response_for(mut self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.by_prompt.insert(prompt.into(), response.into());
        self
    }

    pub fn with_failure_for(mut self, prompt: impl Into<String>, err: NetworkError) -> Self {
        self.failures.insert(prompt.into(), err);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, NetworkError> {
        if self.is_closed() {
            return Err(NetworkError::closed("fake client was closed"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        let prompt = request.prompt();
        if let Some(err) = self.failures.get(prompt) {
            return Err(err.clone());
        }
        let text = self
            .by_prompt
            .get(prompt)
            .or(self.fixed_response.as_ref())
            .cloned()
            .unwrap_or_else(|| prompt.to_string());

        Ok(LlmResponse {
            text,
            provider: "fake".to_string(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
