//! Seed data for the store: chat configurations, groups and test cases.
//!
//! ```yaml
//! chats:
//!   - identifier: gpt4
//!     endpoint: https://api.openai.com/v1
//!     model: gpt-4
//! groups: [respiratory]
//! cases:
//!   - name: dyspnea-smoker
//!     input: 65 y/o smoker with progressive dyspnea
//!     groups: [respiratory]
//!     diagnoses:
//!       - name: COPD
//!         pattern: copd | (chronic & obstructive)
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Orchestrator;
use crate::errors::{ConfigError, DdxError};
use crate::model::{ChatConfig, TestCase};
use crate::pattern::{Pattern, PatternError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixtures {
    #[serde(default)]
    pub chats: Vec<ChatConfig>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub chats: usize,
    pub groups: usize,
    pub cases: usize,
    /// Stored as given; how they are treated at run time depends on the policy.
    #[serde(skip)]
    pub invalid_patterns: Vec<(String, PatternError)>,
}

pub fn parse_fixtures(raw: &str) -> Result<Fixtures, ConfigError> {
    serde_yaml::from_str(raw).map_err(|e| ConfigError(format!("failed to parse fixtures: {}", e)))
}

pub fn load_fixtures(path: &Path) -> Result<Fixtures, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read fixtures {}: {}", path.display(), e)))?;
    parse_fixtures(&raw)
}

/// Write fixtures through the orchestrator so chat changes drop cached clients.
pub async fn import(orch: &Orchestrator, fixtures: &Fixtures) -> Result<ImportSummary, DdxError> {
    let mut summary = ImportSummary::default();

    for chat in &fixtures.chats {
        orch.save_chat_config(chat).await?;
        summary.chats += 1;
    }

    let mut groups: Vec<&str> = fixtures.groups.iter().map(String::as_str).collect();
    for case in &fixtures.cases {
        groups.extend(case.groups.iter().map(String::as_str));
    }
    groups.sort_unstable();
    groups.dedup();
    for g in &groups {
        orch.store().upsert_group(g)?;
    }
    summary.groups = groups.len();

    for case in &fixtures.cases {
        for d in &case.diagnoses {
            if let Err(e) = Pattern::compile(&d.pattern) {
                tracing::warn!(case = %case.name, diagnosis = %d.name, error = %e, "invalid pattern imported");
                summary.invalid_patterns.push((d.name.clone(), e));
            }
        }
        orch.store().upsert_test_case(case)?;
        summary.cases += 1;
    }

    tracing::info!(
        chats = summary.chats,
        groups = summary.groups,
        cases = summary.cases,
        "fixtures imported"
    );
    Ok(summary)
}
