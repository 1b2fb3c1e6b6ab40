use serde::{Deserialize, Serialize};

use crate::model::{DiagnosisSnapshot, RankedMatch};
use crate::pattern::{Pattern, PatternError};

/// What to do with a diagnosis whose pattern does not compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternErrorPolicy {
    /// Log and leave the diagnosis out of the result; the case still counts.
    #[default]
    Skip,
    /// Fail the whole work unit.
    Fail,
}

impl PatternErrorPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Some(PatternErrorPolicy::Skip),
            "fail" => Some(PatternErrorPolicy::Fail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDiagnosis {
    pub diagnosis_id: i64,
    pub diagnosis: String,
    pub error: PatternError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub ranked: Vec<RankedMatch>,
    pub skipped: Vec<SkippedDiagnosis>,
}

/// Position (1-indexed) of the first suggestion the pattern accepts, or 0.
pub fn rank_of(pattern: &Pattern, suggestions: &[String]) -> u32 {
    suggestions
        .iter()
        .position(|s| pattern.matches(s))
        .map(|i| i as u32 + 1)
        .unwrap_or(0)
}

/// Rank every expected diagnosis of one case against its suggestions.
///
/// Diagnoses are matched independently; output order follows `diagnoses`.
pub fn evaluate_case(
    diagnoses: &[DiagnosisSnapshot],
    suggestions: &[String],
    policy: PatternErrorPolicy,
) -> Result<Evaluation, PatternError> {
    let mut out = Evaluation::default();

    for d in diagnoses {
        let pattern = match Pattern::compile(&d.pattern) {
            Ok(p) => p,
            Err(e) => match policy {
                PatternErrorPolicy::Fail => return Err(e),
                PatternErrorPolicy::Skip => {
                    tracing::warn!(
                        diagnosis_id = d.id,
                        diagnosis = %d.name,
                        error = %e,
                        "skipping diagnosis with invalid pattern"
                    );
                    out.skipped.push(SkippedDiagnosis {
                        diagnosis_id: d.id,
                        diagnosis: d.name.clone(),
                        error: e,
                    });
                    continue;
                }
            },
        };

        out.ranked.push(RankedMatch {
            diagnosis_id: d.id,
            diagnosis: d.name.clone(),
            rank: rank_of(&pattern, suggestions),
        });
    }

    Ok(out)
}
