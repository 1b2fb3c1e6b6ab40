use anyhow::Context;
use ddx_core::config::{load_or_default, Settings};
use ddx_core::engine::{ExecutionMode, Orchestrator};
use ddx_core::matcher::PatternErrorPolicy;
use ddx_core::storage::Store;

use super::super::args::{EngineArgs, GlobalArgs};

/// Layer flags (and their env vars) over the config file.
fn overrides(global: &GlobalArgs, engine: Option<&EngineArgs>) -> Settings {
    let mut s = Settings {
        db: global.db.clone(),
        ..Default::default()
    };
    if let Some(e) = engine {
        s.parallel = e.parallel;
        s.timeout_seconds = e.timeout_seconds;
        s.pattern_errors = e.pattern_errors.as_deref().and_then(PatternErrorPolicy::parse);
    }
    s
}

pub(crate) fn open_store(global: &GlobalArgs) -> anyhow::Result<Store> {
    let cfg = load_or_default(global.config.as_deref())?;
    let settings = cfg.settings.merge(overrides(global, None));
    let db = settings.db_path();
    let store = Store::open(&db).with_context(|| format!("failed to open {}", db.display()))?;
    store.init_schema()?;
    Ok(store)
}

pub(crate) fn build_orchestrator(
    global: &GlobalArgs,
    engine: Option<&EngineArgs>,
) -> anyhow::Result<(Orchestrator, ExecutionMode)> {
    let cfg = load_or_default(global.config.as_deref())?;
    let settings = cfg.settings.merge(overrides(global, engine));
    let db = settings.db_path();
    let store = Store::open(&db).with_context(|| format!("failed to open {}", db.display()))?;
    store.init_schema()?;

    let engine_settings = settings.engine_settings()?;
    let mode = match engine {
        Some(e) if e.worker => ExecutionMode::worker_pool(engine_settings.parallel),
        _ => ExecutionMode::Sequential,
    };
    tracing::debug!(db = %db.display(), ?mode, "engine configured");
    Ok((Orchestrator::with_http_clients(store, engine_settings), mode))
}
