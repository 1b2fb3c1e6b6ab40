//! Reusable LLM clients keyed by chat configuration and connection fingerprint.
//!
//! Each key has its own async slot lock, so `get_client` and `invalidate` on
//! one configuration are serialized while other configurations proceed. A
//! client is only ever closed under its slot lock, and `get_client` rebuilds a
//! slot whose client reports closed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::NetworkError;
use crate::model::{ChatSnapshot, ConfigId};
use crate::providers::llm::fake::FakeClient;
use crate::providers::llm::openai::OpenAIClient;
use crate::providers::llm::LlmClient;

/// Endpoint scheme that selects the offline echo client.
pub const FAKE_SCHEME: &str = "fake://";

pub trait ClientFactory: Send + Sync {
    fn build(&self, chat: &ChatSnapshot) -> Result<Arc<dyn LlmClient>, NetworkError>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ChatSnapshot) -> Result<Arc<dyn LlmClient>, NetworkError> + Send + Sync,
{
    fn build(&self, chat: &ChatSnapshot) -> Result<Arc<dyn LlmClient>, NetworkError> {
        self(chat)
    }
}

/// Builds OpenAI-compatible clients, or a [`FakeClient`] for `fake://` endpoints.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    pub timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, chat: &ChatSnapshot) -> Result<Arc<dyn LlmClient>, NetworkError> {
        if chat.endpoint.starts_with(FAKE_SCHEME) {
            return Ok(Arc::new(FakeClient::new(chat.model.clone())));
        }
        Ok(Arc::new(OpenAIClient::new(chat, self.timeout)?))
    }
}

type Slot = Arc<AsyncMutex<Option<Arc<dyn LlmClient>>>>;

/// Digest of the parameters a client is built from.
///
/// Runs snapshot their chat configuration, so two runs of one configuration
/// may disagree on endpoint or credentials after an edit; each gets its own
/// client.
pub fn connection_fingerprint(chat: &ChatSnapshot) -> String {
    let mut hasher = Sha256::new();
    for part in [&chat.endpoint, &chat.api_key, &chat.model] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    slots: Mutex<HashMap<(ConfigId, String), Slot>>,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<(ConfigId, String), Slot>> {
        match self.slots.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn slot(&self, chat: &ChatSnapshot) -> Slot {
        let key = (chat.config_id, connection_fingerprint(chat));
        self.slots().entry(key).or_default().clone()
    }

    fn slots_for(&self, id: ConfigId) -> Vec<Slot> {
        self.slots()
            .iter()
            .filter(|((config_id, _), _)| *config_id == id)
            .map(|(_, slot)| slot.clone())
            .collect()
    }

    /// Cached client for this snapshot of `chat.config_id`, built on first use.
    pub async fn get_client(&self, chat: &ChatSnapshot) -> Result<Arc<dyn LlmClient>, NetworkError> {
        let slot = self.slot(chat);
        let mut entry = slot.lock().await;
        if let Some(client) = entry.as_ref() {
            if !client.is_closed() {
                tracing::debug!(config_id = chat.config_id, "client cache hit");
                return Ok(client.clone());
            }
        }
        let client = self.factory.build(chat)?;
        tracing::debug!(
            config_id = chat.config_id,
            provider = client.provider_name(),
            "client created"
        );
        *entry = Some(client.clone());
        Ok(client)
    }

    /// Close and drop every cached client of the configuration, whatever
    /// snapshot it was built from. Returns whether any was cached.
    pub async fn invalidate(&self, id: ConfigId) -> bool {
        let mut dropped = false;
        for slot in self.slots_for(id) {
            if let Some(client) = slot.lock().await.take() {
                client.close();
                dropped = true;
            }
        }
        if dropped {
            tracing::debug!(config_id = id, "client invalidated");
        }
        dropped
    }

    pub async fn is_cached(&self, id: ConfigId) -> bool {
        for slot in self.slots_for(id) {
            if slot.lock().await.is_some() {
                return true;
            }
        }
        false
    }
}
