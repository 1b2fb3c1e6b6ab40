use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use super::fanin::FanIn;
use super::unit::{UnitFailure, UnitOutcome, WorkUnit};
use super::{EngineSettings, ExecutionMode};
use crate::client_cache::{ClientCache, HttpClientFactory};
use crate::errors::{DdxError, NetworkError, NetworkErrorKind, StoreError};
use crate::matcher::evaluate_case;
use crate::model::{ChatConfig, ConfigId, RunSnapshot, RunStatus};
use crate::parse::parse_suggestions;
use crate::providers::llm::{ChatRequest, LlmClient, LlmResponse};
use crate::storage::Store;

/// What a finished run looked like once its callback had fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub total: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub skipped_diagnoses: usize,
    pub failures: Vec<UnitFailure>,
}

/// A run started on the runtime in the background.
#[derive(Debug)]
pub struct DispatchHandle {
    pub run_id: i64,
    handle: JoinHandle<Result<RunReport, DdxError>>,
}

impl DispatchHandle {
    pub async fn wait(self) -> Result<RunReport, DdxError> {
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(DdxError::Task(e.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum Triggered {
    Finished(RunReport),
    Dispatched(DispatchHandle),
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Store,
    cache: Arc<ClientCache>,
    settings: EngineSettings,
}

impl Orchestrator {
    pub fn new(store: Store, cache: Arc<ClientCache>, settings: EngineSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    /// Orchestrator whose clients talk to real endpoints (or `fake://`).
    pub fn with_http_clients(store: Store, settings: EngineSettings) -> Self {
        let factory = HttpClientFactory::new(settings.timeout);
        let cache = Arc::new(ClientCache::new(Arc::new(factory)));
        Self::new(store, cache, settings)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ClientCache> {
        &self.cache
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Snapshot the group and chat and persist a NOT_STARTED run.
    pub fn create_run(&self, group: &str, chat: &str) -> Result<i64, DdxError> {
        let Some(group_id) = self.store.group_id(group)? else {
            return Err(DdxError::NotFound {
                entity: "TestGroup",
                name: group.to_string(),
                valid: self.store.group_names()?,
            });
        };
        let Some((chat_id, config)) = self.store.chat_config(chat)? else {
            return Err(DdxError::NotFound {
                entity: "ChatConfig",
                name: chat.to_string(),
                valid: self.store.chat_identifiers()?,
            });
        };

        let snapshot = RunSnapshot {
            group: group.to_string(),
            chat: config.snapshot(chat_id),
            cases: self.store.cases_for_group(group_id)?,
        };
        let run_id = self.store.create_run(group_id, chat_id, &snapshot)?;
        tracing::info!(
            run_id,
            group,
            chat,
            cases = snapshot.cases.len(),
            "run created"
        );
        Ok(run_id)
    }

    /// Execute every unit of the run and fire the completion or failure callback.
    pub async fn start_run(&self, run_id: i64, mode: ExecutionMode) -> Result<RunReport, DdxError> {
        let snapshot = self.store.load_snapshot(run_id)?;
        self.store.transition_run(run_id, RunStatus::Started)?;
        tracing::info!(run_id, ?mode, cases = snapshot.cases.len(), "run started");

        let chat = Arc::new(snapshot.chat);
        let config_id = chat.config_id;
        let units: Vec<WorkUnit> = snapshot
            .cases
            .into_iter()
            .map(|case| WorkUnit {
                run_id,
                case,
                chat: chat.clone(),
            })
            .collect();
        let total = units.len();
        let fanin = Arc::new(FanIn::new(total));

        let fired = match mode {
            ExecutionMode::Sequential => self.run_sequential(units, &fanin).await,
            ExecutionMode::WorkerPool { parallel } => {
                self.run_pool(units, &fanin, parallel.max(1)).await
            }
        };
        let outcomes = fired.or_else(|| fanin.fire_empty()).unwrap_or_default();

        let failures: Vec<UnitFailure> = outcomes
            .iter()
            .filter_map(|o| o.failure().cloned())
            .collect();
        let status = if failures.is_empty() {
            self.on_all_complete(run_id, config_id).await?
        } else {
            self.on_any_failed(run_id, config_id, &failures).await?
        };

        let mut report = RunReport {
            run_id,
            status,
            total,
            completed: 0,
            cancelled: 0,
            skipped_diagnoses: 0,
            failures,
        };
        for o in &outcomes {
            match o {
                UnitOutcome::Completed { skipped, .. } => {
                    report.completed += 1;
                    report.skipped_diagnoses += skipped;
                }
                UnitOutcome::Cancelled { .. } => report.cancelled += 1,
                UnitOutcome::Failed(_) => {}
            }
        }
        Ok(report)
    }

    async fn run_sequential(
        &self,
        units: Vec<WorkUnit>,
        fanin: &FanIn,
    ) -> Option<Vec<UnitOutcome>> {
        let mut fired = None;
        for unit in &units {
            let outcome = self.execute_unit(unit).await;
            if let Some(all) = fanin.arrive(outcome) {
                fired = Some(all);
            }
        }
        fired
    }

    async fn run_pool(
        &self,
        units: Vec<WorkUnit>,
        fanin: &Arc<FanIn>,
        parallel: usize,
    ) -> Option<Vec<UnitOutcome>> {
        let sem = Arc::new(Semaphore::new(parallel));
        let mut join_set = JoinSet::new();
        let mut fired = None;

        for unit in units {
            let permit = match sem.clone().acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    let failure = UnitFailure::new(Some(unit.case.id), "task", e.to_string());
                    if let Some(all) = fanin.arrive(UnitOutcome::Failed(failure)) {
                        fired = Some(all);
                    }
                    continue;
                }
            };
            let this = self.clone();
            let fanin = fanin.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let outcome = this.execute_unit(&unit).await;
                fanin.arrive(outcome)
            });
        }

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(Some(all)) => fired = Some(all),
                Ok(None) => {}
                Err(e) => {
                    // A panicked unit never arrived; report it so the barrier still fires.
                    let failure = UnitFailure::new(None, "task", format!("join error: {}", e));
                    if let Some(all) = fanin.arrive(UnitOutcome::Failed(failure)) {
                        fired = Some(all);
                    }
                }
            }
        }
        fired
    }

    /// Run one unit. Errors become a `Failed` outcome; they never escape.
    pub async fn execute_unit(&self, unit: &WorkUnit) -> UnitOutcome {
        match self.run_unit(unit).await {
            Ok(outcome) => outcome,
            Err(e) => UnitOutcome::Failed(UnitFailure::from_error(Some(unit.case.id), &e)),
        }
    }

    async fn run_unit(&self, unit: &WorkUnit) -> Result<UnitOutcome, DdxError> {
        let run_id = unit.run_id;
        let case_id = unit.case.id;

        if self.store.run_status(run_id)? == RunStatus::Cancelled {
            tracing::info!(run_id, case_id, "run cancelled; unit not executed");
            return Ok(UnitOutcome::Cancelled { case_id });
        }

        let response = self.complete(unit).await?;
        let suggestions = parse_suggestions(&response.text);
        let evaluation = evaluate_case(
            &unit.case.diagnoses,
            &suggestions,
            self.settings.pattern_errors,
        )?;
        let result_id =
            self.store
                .save_case_result(run_id, &unit.case, &response.text, &evaluation.ranked)?;

        tracing::info!(
            run_id,
            case_id,
            result_id,
            suggestions = suggestions.len(),
            found = evaluation.ranked.iter().filter(|m| m.found()).count(),
            "case evaluated"
        );
        Ok(UnitOutcome::Completed {
            case_id,
            result_id,
            skipped: evaluation.skipped.len(),
        })
    }

    async fn complete(&self, unit: &WorkUnit) -> Result<LlmResponse, NetworkError> {
        let request = ChatRequest::for_case(&unit.chat, &unit.case.input);
        let client = self.cache.get_client(&unit.chat).await?;
        match self.call_llm(client, &request).await {
            // Another run invalidated this client mid-flight.
            Err(e) if e.kind == NetworkErrorKind::Closed => {
                let client = self.cache.get_client(&unit.chat).await?;
                self.call_llm(client, &request).await
            }
            other => other,
        }
    }

    async fn call_llm(
        &self,
        client: Arc<dyn LlmClient>,
        request: &ChatRequest,
    ) -> Result<LlmResponse, NetworkError> {
        let t = self.settings.timeout;
        match timeout(t, client.complete(request)).await {
            Ok(res) => res,
            Err(_) => Err(NetworkError::timeout(format!(
                "no response within {}s",
                t.as_secs_f64()
            ))
            .with_provider(client.provider_name())),
        }
    }

    /// Aggregate callback when no unit failed.
    pub async fn on_all_complete(
        &self,
        run_id: i64,
        config_id: ConfigId,
    ) -> Result<RunStatus, DdxError> {
        self.cache.invalidate(config_id).await;
        self.finish(run_id, RunStatus::Completed)
    }

    /// Aggregate callback when at least one unit failed.
    pub async fn on_any_failed(
        &self,
        run_id: i64,
        config_id: ConfigId,
        failures: &[UnitFailure],
    ) -> Result<RunStatus, DdxError> {
        self.cache.invalidate(config_id).await;
        for f in failures {
            tracing::error!(
                run_id,
                case_id = ?f.case_id,
                kind = %f.kind,
                cause = %f.message,
                "work unit failed"
            );
            if let Err(e) = self
                .store
                .record_run_error(run_id, f.case_id, &f.kind, &f.message)
            {
                tracing::error!(run_id, error = %e, "failed to record run error");
            }
        }
        self.finish(run_id, RunStatus::Failed)
    }

    fn finish(&self, run_id: i64, to: RunStatus) -> Result<RunStatus, DdxError> {
        match self.store.transition_run(run_id, to) {
            Ok(()) => {
                tracing::info!(run_id, status = %to, "run finished");
                Ok(to)
            }
            Err(StoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(run_id, current = %from, wanted = %to, "run status left unchanged");
                Ok(from)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mark the run cancelled. Units that have not reached the network skip it.
    pub fn cancel_run(&self, run_id: i64) -> Result<(), DdxError> {
        self.store.transition_run(run_id, RunStatus::Cancelled)?;
        tracing::info!(run_id, "run cancelled");
        Ok(())
    }

    /// Start the run on the runtime and return immediately.
    pub fn dispatch(&self, run_id: i64, mode: ExecutionMode) -> DispatchHandle {
        let this = self.clone();
        let handle = tokio::spawn(async move { this.start_run(run_id, mode).await });
        DispatchHandle { run_id, handle }
    }

    /// Validate and store a chat configuration, then drop its cached client.
    pub async fn save_chat_config(&self, config: &ChatConfig) -> Result<ConfigId, DdxError> {
        config.validate()?;
        let id = self.store.upsert_chat_config(config)?;
        if self.cache.invalidate(id).await {
            tracing::debug!(config_id = id, chat = %config.identifier, "cached client replaced");
        }
        Ok(id)
    }

    /// Create a run and either execute it or dispatch it in the background.
    pub async fn trigger(
        &self,
        group: &str,
        chat: &str,
        mode: ExecutionMode,
        background: bool,
    ) -> Result<Triggered, DdxError> {
        let run_id = self.create_run(group, chat)?;
        if background {
            Ok(Triggered::Dispatched(self.dispatch(run_id, mode)))
        } else {
            Ok(Triggered::Finished(self.start_run(run_id, mode).await?))
        }
    }
}
