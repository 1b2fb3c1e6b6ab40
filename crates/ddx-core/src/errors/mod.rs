use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::model::RunStatus;
pub use crate::pattern::{PatternError, PatternErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}
impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    RateLimit,
    Server,
    Transport,
    MalformedResponse,
    Closed,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::Timeout => "provider_timeout",
            NetworkErrorKind::RateLimit => "provider_rate_limit",
            NetworkErrorKind::Server => "provider_server",
            NetworkErrorKind::Transport => "network",
            NetworkErrorKind::MalformedResponse => "malformed_response",
            NetworkErrorKind::Closed => "client_closed",
        }
    }
}

/// Failure of a completion call. Never retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {detail}", .kind.as_str())]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub status: Option<u16>,
    pub provider: Option<String>,
    pub detail: String,
}

impl NetworkError {
    pub fn new(kind: NetworkErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            provider: None,
            detail: detail.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Timeout, detail)
    }

    pub fn rate_limit(status: u16, detail: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::RateLimit, detail).with_status(status)
    }

    pub fn server(status: Option<u16>, detail: impl Into<String>) -> Self {
        let err = Self::new(NetworkErrorKind::Server, detail);
        match status {
            Some(s) => err.with_status(s),
            None => err,
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Transport, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::MalformedResponse, detail)
    }

    pub fn closed(detail: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Closed, detail)
    }

    /// Map an HTTP status from the provider to an error kind.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 {
            Self::rate_limit(status, body)
        } else {
            Self::server(Some(status), body)
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::timeout(e.to_string())
        } else if e.is_decode() {
            NetworkError::malformed(e.to_string())
        } else if let Some(status) = e.status() {
            NetworkError::from_status(status.as_u16(), e.to_string())
        } else {
            NetworkError::transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Run {run_id} not found")]
    RunNotFound { run_id: i64 },

    #[error("Run {run_id}: transition {from} -> {to} rejected")]
    InvalidTransition {
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
    },

    #[error("Run {run_id}: snapshot digest mismatch (stored {stored}, computed {computed})")]
    SnapshotDigestMismatch {
        run_id: i64,
        stored: String,
        computed: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum DdxError {
    #[error("{entity} '{name}' does not exist: {valid:?}")]
    NotFound {
        entity: &'static str,
        name: String,
        valid: Vec<String>,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl DdxError {
    /// Stable kind string used in the run error log.
    pub fn kind(&self) -> &'static str {
        match self {
            DdxError::NotFound { .. } => "not_found",
            DdxError::Pattern(_) => "pattern",
            DdxError::Network(e) => e.kind.as_str(),
            DdxError::Store(_) => "store",
            DdxError::Config(_) => "config",
            DdxError::Task(_) => "task",
        }
    }
}
