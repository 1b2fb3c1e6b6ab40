mod common;

use common::{case, memory_store, orchestrator, seed, Script};
use ddx_core::engine::{EngineSettings, ExecutionMode, Triggered};
use ddx_core::model::RunStatus;
use ddx_core::report::RunSummary;
use std::sync::Arc;

const INPUT: &str = "patient has cough and fever";
const RESPONSE: &str = "1. Bronchitis\n2. Pneumonia\n";

#[tokio::test]
async fn pneumonia_is_found_at_rank_two() {
    let script = Arc::new(Script::default().respond(INPUT, RESPONSE));
    let orch = orchestrator(memory_store(), script.clone(), EngineSettings::default());
    seed(
        &orch,
        "C",
        &[case(
            "cough-fever",
            INPUT,
            "G",
            &[("Pneumonia", "pneumonia | (cough & fever)")],
        )],
    )
    .await;

    let run_id = orch.create_run("G", "C").unwrap();
    let report = orch.start_run(run_id, ExecutionMode::Sequential).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.completed, 1);
    assert!(report.failures.is_empty());

    let results = orch.store().case_results(run_id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].response, RESPONSE);
    let ranks: Vec<(&str, u32)> = results[0]
        .ranks
        .iter()
        .map(|m| (m.diagnosis.as_str(), m.rank))
        .collect();
    assert_eq!(ranks, vec![("Pneumonia", 2)]);

    assert_eq!(script.calls(), 1);
    assert_eq!(script.prompts(), vec![INPUT.to_string()]);
}

#[tokio::test]
async fn later_edits_do_not_change_a_created_run() {
    let script = Arc::new(Script::default().respond(INPUT, RESPONSE));
    let orch = orchestrator(memory_store(), script, EngineSettings::default());
    seed(
        &orch,
        "C",
        &[case("cough-fever", INPUT, "G", &[("Pneumonia", "pneumonia")])],
    )
    .await;
    let run_id = orch.create_run("G", "C").unwrap();

    // Edit the case after the run was created.
    orch.store()
        .upsert_test_case(&case("cough-fever", "something else", "G", &[("Pneumonia", "zzz")]))
        .unwrap();

    orch.start_run(run_id, ExecutionMode::Sequential).await.unwrap();
    let results = orch.store().case_results(run_id).unwrap();
    assert_eq!(results[0].response, RESPONSE);
    assert_eq!(results[0].ranks[0].rank, 2);
}

#[tokio::test]
async fn background_trigger_reports_through_handle() {
    let script = Arc::new(Script::default().respond(INPUT, RESPONSE));
    let orch = orchestrator(memory_store(), script, EngineSettings::default());
    seed(
        &orch,
        "C",
        &[case("cough-fever", INPUT, "G", &[("Pneumonia", "pneumonia")])],
    )
    .await;

    let Triggered::Dispatched(handle) = orch
        .trigger("G", "C", ExecutionMode::worker_pool(2), true)
        .await
        .unwrap()
    else {
        panic!("expected a dispatched run");
    };
    let run_id = handle.run_id;
    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let summary = RunSummary::from_store(orch.store(), run_id).unwrap();
    assert_eq!(summary.top1, 0);
    assert_eq!(summary.top_k[0].hits, 1);
    assert_eq!(summary.run.status, RunStatus::Completed);
}
