use std::sync::Arc;

use serde::Serialize;

use crate::errors::DdxError;
use crate::model::{CaseSnapshot, ChatSnapshot};

/// One test case of one run.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub run_id: i64,
    pub case: CaseSnapshot,
    pub chat: Arc<ChatSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub case_id: Option<i64>,
    pub kind: String,
    pub message: String,
}

impl UnitFailure {
    pub fn new(case_id: Option<i64>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            case_id,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn from_error(case_id: Option<i64>, err: &DdxError) -> Self {
        Self::new(case_id, err.kind(), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Completed {
        case_id: i64,
        result_id: i64,
        skipped: usize,
    },
    /// The run was cancelled before this unit reached the network.
    Cancelled { case_id: i64 },
    Failed(UnitFailure),
}

impl UnitOutcome {
    pub fn failure(&self) -> Option<&UnitFailure> {
        match self {
            UnitOutcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}
