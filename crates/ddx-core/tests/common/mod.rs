#![allow(dead_code)]

use async_trait::async_trait;
use ddx_core::client_cache::ClientCache;
use ddx_core::engine::{EngineSettings, Orchestrator};
use ddx_core::errors::NetworkError;
use ddx_core::model::{ChatConfig, ChatSnapshot, Diagnosis, TestCase};
use ddx_core::providers::llm::{ChatRequest, LlmClient, LlmResponse};
use ddx_core::storage::Store;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// Replies shared by every client the factory builds.
#[derive(Default)]
pub struct Script {
    pub responses: HashMap<String, String>,
    pub failures: HashMap<String, NetworkError>,
    pub delays: HashMap<String, Duration>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub on_call: Option<Hook>,
    /// Answer with the endpoint the client was built for.
    pub echo_endpoint: bool,
}

impl Script {
    pub fn respond(mut self, prompt: &str, text: &str) -> Self {
        self.responses.insert(prompt.into(), text.into());
        self
    }

    pub fn fail(mut self, prompt: &str, err: NetworkError) -> Self {
        self.failures.insert(prompt.into(), err);
        self
    }

    pub fn delay(mut self, prompt: &str, d: Duration) -> Self {
        self.delays.insert(prompt.into(), d);
        self
    }

    pub fn on_call(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub fn answer_with_endpoint(mut self) -> Self {
        self.echo_endpoint = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub struct ScriptedClient {
    script: Arc<Script>,
    endpoint: String,
    closed: AtomicBool,
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, NetworkError> {
        if self.is_closed() {
            return Err(NetworkError::closed("scripted client closed"));
        }
        let prompt = request.prompt().to_string();
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        self.script.prompts.lock().unwrap().push(prompt.clone());
        if let Some(hook) = &self.script.on_call {
            hook(&prompt);
        }
        if let Some(d) = self.script.delays.get(&prompt) {
            tokio::time::sleep(*d).await;
            // Closed while the request was in flight.
            if self.is_closed() {
                return Err(NetworkError::closed("scripted client closed mid-request"));
            }
        }
        if let Some(err) = self.script.failures.get(&prompt) {
            return Err(err.clone());
        }
        let text = if self.script.echo_endpoint {
            self.endpoint.clone()
        } else {
            self.script
                .responses
                .get(&prompt)
                .cloned()
                .unwrap_or_default()
        };
        Ok(LlmResponse {
            text,
            provider: "scripted".into(),
            model: request.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn memory_store() -> Store {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    store
}

pub fn orchestrator(store: Store, script: Arc<Script>, settings: EngineSettings) -> Orchestrator {
    let factory = move |chat: &ChatSnapshot| -> Result<Arc<dyn LlmClient>, NetworkError> {
        Ok(Arc::new(ScriptedClient {
            script: script.clone(),
            endpoint: chat.endpoint.clone(),
            closed: AtomicBool::new(false),
        }))
    };
    let cache = Arc::new(ClientCache::new(Arc::new(factory)));
    Orchestrator::new(store, cache, settings)
}

pub fn chat(identifier: &str) -> ChatConfig {
    ChatConfig {
        identifier: identifier.into(),
        active: true,
        endpoint: "scripted://".into(),
        api_key: String::new(),
        model: "scripted-model".into(),
        stream: false,
        messages: vec![],
        sampling: Default::default(),
    }
}

pub fn case(name: &str, input: &str, group: &str, diagnoses: &[(&str, &str)]) -> TestCase {
    TestCase {
        name: name.into(),
        input: input.into(),
        groups: vec![group.into()],
        diagnoses: diagnoses
            .iter()
            .map(|(n, p)| Diagnosis {
                name: n.to_string(),
                pattern: p.to_string(),
            })
            .collect(),
    }
}

pub async fn seed(orch: &Orchestrator, chat_id: &str, cases: &[TestCase]) {
    orch.save_chat_config(&chat(chat_id)).await.unwrap();
    for c in cases {
        orch.store().upsert_test_case(c).unwrap();
    }
}
