pub mod console;
pub mod json;

use serde::Serialize;

use crate::errors::StoreError;
use crate::model::{CaseResult, Run, RunErrorRow};
use crate::storage::Store;

/// Cut-offs reported besides top-1.
pub const TOP_K: [u32; 3] = [3, 5, 10];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopK {
    pub k: u32,
    pub hits: usize,
}

/// Aggregate view over the results of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run: Run,
    /// Number of (case, diagnosis) rank rows.
    pub expected: usize,
    pub top1: usize,
    pub top_k: Vec<TopK>,
    pub misses: usize,
    pub cases: Vec<CaseResult>,
    pub errors: Vec<RunErrorRow>,
}

impl RunSummary {
    pub fn build(run: Run, cases: Vec<CaseResult>, errors: Vec<RunErrorRow>) -> Self {
        let ranks: Vec<u32> = cases
            .iter()
            .flat_map(|c| c.ranks.iter().map(|m| m.rank))
            .collect();
        let hits_within = |k: u32| ranks.iter().filter(|&&r| r >= 1 && r <= k).count();
        Self {
            expected: ranks.len(),
            top1: hits_within(1),
            top_k: TOP_K
                .iter()
                .map(|&k| TopK {
                    k,
                    hits: hits_within(k),
                })
                .collect(),
            misses: ranks.iter().filter(|&&r| r == 0).count(),
            run,
            cases,
            errors,
        }
    }

    pub fn from_store(store: &Store, run_id: i64) -> Result<Self, StoreError> {
        let run = store.run(run_id)?;
        let cases = store.case_results(run_id)?;
        let errors = store.run_errors(run_id)?;
        Ok(Self::build(run, cases, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RankedMatch, RunStatus};

    pub(crate) fn sample() -> RunSummary {
        let run = Run {
            id: 4,
            status: RunStatus::Completed,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            finished_at: Some("2026-01-01T00:01:00+00:00".into()),
            group: "G".into(),
            chat: "C".into(),
            snapshot_sha256: "ab".into(),
        };
        let m = |id: i64, name: &str, rank: u32| RankedMatch {
            diagnosis_id: id,
            diagnosis: name.into(),
            rank,
        };
        let cases = vec![
            CaseResult {
                id: 1,
                run_id: 4,
                case_id: 10,
                case_name: "dyspnea".into(),
                response: "1. Pneumonia\n2. COPD".into(),
                ranks: vec![m(1, "COPD", 2), m(2, "Asthma", 0)],
            },
            CaseResult {
                id: 2,
                run_id: 4,
                case_id: 11,
                case_name: "chest pain".into(),
                response: "1. MI".into(),
                ranks: vec![m(3, "MI", 1), m(4, "PE", 7)],
            },
        ];
        RunSummary::build(run, cases, vec![])
    }

    #[test]
    fn counts_hits_per_cutoff() {
        let s = sample();
        assert_eq!(s.expected, 4);
        assert_eq!(s.top1, 1);
        let ks: Vec<(u32, usize)> = s.top_k.iter().map(|t| (t.k, t.hits)).collect();
        assert_eq!(ks, vec![(3, 2), (5, 2), (10, 3)]);
        assert_eq!(s.misses, 1);
    }
}
