pub mod fanin;
pub mod orchestrator;
pub mod unit;

use std::time::Duration;

use crate::matcher::PatternErrorPolicy;

pub use fanin::FanIn;
pub use orchestrator::{DispatchHandle, Orchestrator, RunReport, Triggered};
pub use unit::{UnitFailure, UnitOutcome, WorkUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Units run one after another on the calling task.
    Sequential,
    /// Units run concurrently, at most `parallel` at a time.
    WorkerPool { parallel: usize },
}

impl ExecutionMode {
    pub fn worker_pool(parallel: usize) -> Self {
        ExecutionMode::WorkerPool {
            parallel: parallel.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Upper bound on a single completion call.
    pub timeout: Duration,
    pub parallel: usize,
    pub pattern_errors: PatternErrorPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            parallel: 4,
            pattern_errors: PatternErrorPolicy::Skip,
        }
    }
}
