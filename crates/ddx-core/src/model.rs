use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfigError;

/// Row id of a stored chat configuration; the client cache key.
pub type ConfigId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogitBias {
    pub token: String,
    pub bias: i32,
}

/// Optional sampling parameters. Unset values are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logit_bias: Vec<LogitBias>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl SamplingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", self.presence_penalty, -2.0, 2.0)?;
        check_range("temperature", self.temperature, 0.0, 2.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        if let Some(max) = self.max_tokens {
            if !(1..=2000).contains(&max) {
                return Err(ConfigError(format!(
                    "max_tokens must be within 1..=2000 (got {})",
                    max
                )));
            }
        }
        for lb in &self.logit_bias {
            if !(-100..=100).contains(&lb.bias) {
                return Err(ConfigError(format!(
                    "logit_bias for token '{}' must be within -100..=100 (got {})",
                    lb.token, lb.bias
                )));
            }
        }
        Ok(())
    }
}

fn check_range(field: &str, value: Option<f32>, min: f32, max: f32) -> Result<(), ConfigError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ConfigError(format!(
            "{} must be within {}..={} (got {})",
            field, min, max, v
        ))),
        _ => Ok(()),
    }
}

fn default_true() -> bool {
    true
}

/// Connection parameters for one chat backend, as administered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub identifier: String,
    #[serde(default = "default_true")]
    pub active: bool,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError("chat identifier must not be empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError(format!(
                "chat '{}' has an empty endpoint",
                self.identifier
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError(format!(
                "chat '{}' has an empty model",
                self.identifier
            )));
        }
        self.sampling.validate()
    }

    pub fn snapshot(&self, config_id: ConfigId) -> ChatSnapshot {
        ChatSnapshot {
            config_id,
            identifier: self.identifier.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            messages: self.messages.clone(),
            sampling: self.sampling.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Started,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotStarted => "not_started",
            RunStatus::Started => "started",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(RunStatus::NotStarted),
            "started" => Some(RunStatus::Started),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// States from which `self` may be entered.
    pub fn allowed_predecessors(&self) -> &'static [RunStatus] {
        match self {
            RunStatus::NotStarted => &[],
            RunStatus::Started => &[RunStatus::NotStarted],
            RunStatus::Completed | RunStatus::Failed => &[RunStatus::Started],
            RunStatus::Cancelled => &[RunStatus::NotStarted, RunStatus::Started],
        }
    }

    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub config_id: ConfigId,
    pub identifier: String,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisSnapshot {
    pub id: i64,
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub id: i64,
    pub name: String,
    pub input: String,
    pub diagnoses: Vec<DiagnosisSnapshot>,
}

/// Deep copy of everything a run reads, captured once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub group: String,
    pub chat: ChatSnapshot,
    pub cases: Vec<CaseSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub id: i64,
    pub status: RunStatus,
    pub created_at: String,
    pub finished_at: Option<String>,
    pub group: String,
    pub chat: String,
    pub snapshot_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub diagnosis_id: i64,
    pub diagnosis: String,
    /// 1-indexed suggestion position; 0 when no suggestion matched.
    pub rank: u32,
}

impl RankedMatch {
    pub fn found(&self) -> bool {
        self.rank > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub id: i64,
    pub run_id: i64,
    pub case_id: i64,
    pub case_name: String,
    pub response: String,
    pub ranks: Vec<RankedMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunErrorRow {
    pub run_id: i64,
    pub case_id: Option<i64>,
    pub kind: String,
    pub message: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_successors() {
        let all = [
            RunStatus::NotStarted,
            RunStatus::Started,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
        assert!(RunStatus::NotStarted.can_transition_to(RunStatus::Started));
        assert!(!RunStatus::NotStarted.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Started.can_transition_to(RunStatus::Cancelled));
    }

    #[test]
    fn status_roundtrips_through_storage_strings() {
        for s in ["not_started", "started", "completed", "failed", "cancelled"] {
            assert_eq!(RunStatus::parse(s).map(|st| st.as_str()), Some(s));
        }
        assert_eq!(RunStatus::parse("running"), None);
    }

    #[test]
    fn sampling_ranges_are_enforced() {
        let ok = SamplingParams {
            temperature: Some(0.7),
            top_p: Some(1.0),
            max_tokens: Some(2000),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let hot = SamplingParams {
            temperature: Some(2.5),
            ..Default::default()
        };
        let err = hot.validate().unwrap_err().to_string();
        assert!(err.contains("temperature"), "{}", err);

        let bias = SamplingParams {
            logit_bias: vec![LogitBias {
                token: "50256".into(),
                bias: 101,
            }],
            ..Default::default()
        };
        assert!(bias.validate().is_err());

        let zero_tokens = SamplingParams {
            max_tokens: Some(0),
            ..Default::default()
        };
        assert!(zero_tokens.validate().is_err());
    }

    #[test]
    fn chat_config_yaml_flattens_sampling() {
        let yaml = r#"
identifier: gpt4-ddx
endpoint: https://api.openai.com/v1
api_key: sk-test
model: gpt-4
temperature: 0.2
messages:
  - role: system
    content: List the ten most likely diagnoses, one per line.
"#;
        let cfg: ChatConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.active);
        assert_eq!(cfg.sampling.temperature, Some(0.2));
        assert_eq!(cfg.messages.len(), 1);
        assert!(cfg.validate().is_ok());
    }
}
