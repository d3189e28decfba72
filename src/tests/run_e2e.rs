//! Full runs: archive on disk, selection, deletion, ledger and report.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_partial_json, method},
};

use super::support::{DeletionHarness, SequentialResponder, fast_deletion, write_archive};
use crate::{
    config::{PurgeConfig, SelectionConfig},
    ledger::{FileLedger, LedgerStore, MemoryLedger},
    pipeline::{RunControl, StopReason},
    runner::{self, RunError, Runner},
};

#[tokio::test]
async fn test_mode_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        &[
            ("1", Utc.with_ymd_and_hms(2020, 5, 1, 10, 0, 0).unwrap()),
            ("2", Utc.with_ymd_and_hms(2021, 5, 1, 10, 0, 0).unwrap()),
            ("3", Utc.with_ymd_and_hms(2022, 5, 1, 10, 0, 0).unwrap()),
            ("4", Utc::now() - Duration::days(2)),
            ("5", Utc.with_ymd_and_hms(2019, 5, 1, 10, 0, 0).unwrap()),
        ],
    );

    let config = PurgeConfig {
        selection: SelectionConfig {
            before: NaiveDate::from_ymd_opt(2023, 1, 1),
            protected_ids: vec!["5".into()],
            ..Default::default()
        },
        deletion: crate::config::DeletionConfig {
            test_mode: true,
            ..fast_deletion()
        },
        ..Default::default()
    };

    let ledger = Arc::new(MemoryLedger::new());
    let runner = Runner::from_config(config, ledger.clone(), RunControl::new()).unwrap();

    let plan = runner.plan(&archive).await.unwrap();
    assert_eq!(plan.selection.protected.len(), 1);
    assert_eq!(plan.selection.eligible.len(), 3);
    assert_eq!(plan.selection.skipped.len(), 1);
    assert_eq!(plan.selection.skipped[0].id, "4");

    let outcome = runner.execute(plan.selection).await.unwrap();
    let counters = outcome.summary.counters;
    assert_eq!(counters.found, 5);
    assert_eq!(counters.to_delete, 3);
    assert_eq!(counters.deleted, 3);
    assert_eq!(counters.failed, 0);
    assert_eq!(counters.protected, 1);
    assert_eq!(counters.skipped, 1);
    assert_eq!(outcome.summary.stop_reason, StopReason::Completed);
    assert!(outcome.report.config.test_mode);
    assert_eq!(outcome.report.config.max_date, "2023-01-01T00:00:00Z");
    assert!(ledger.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_id_persisted_then_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let archive = write_archive(dir.path(), &[("101", old), ("102", old), ("103", old)]);
    let ledger_path = dir.path().join("state").join("failed.json");

    let mut harness = DeletionHarness::new().await;
    harness.config.selection.delete_all = true;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"variables": {"tweet_id": "102"}})))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&harness.server)
        .await;
    harness.mount(&SequentialResponder::always(200)).await;

    let runner = Runner::from_config(
        harness.config.clone(),
        Arc::new(FileLedger::new(&ledger_path)),
        RunControl::new(),
    )
    .unwrap();
    let outcome = runner.run(&archive).await.unwrap();

    assert_eq!(outcome.summary.counters.deleted, 2);
    assert_eq!(outcome.summary.counters.failed, 1);
    let stored: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(&ledger_path).unwrap()).unwrap();
    assert_eq!(stored, vec!["102".to_string()]);

    // The endpoint recovers; resume replays only the failed id.
    harness.server.reset().await;
    let responder = SequentialResponder::always(200);
    harness.mount(&responder).await;

    let outcome = runner.resume().await.unwrap();
    assert_eq!(outcome.summary.counters.deleted, 1);
    assert_eq!(responder.call_count(), 1);
    assert_eq!(harness.requested_ids().await, vec!["102".to_string()]);
    assert!(!ledger_path.exists());
}

#[tokio::test]
async fn test_clean_run_clears_previous_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        &[("7", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())],
    );
    let ledger = FileLedger::new(dir.path().join("failed.json"));
    ledger.save(&["9".to_string()]).await.unwrap();

    let harness = DeletionHarness::new().await;
    harness.mount(&SequentialResponder::always(200)).await;

    let runner = Runner::from_config(
        harness.config.clone(),
        Arc::new(ledger.clone()),
        RunControl::new(),
    )
    .unwrap();
    runner.run(&archive).await.unwrap();

    assert!(ledger.load().await.unwrap().is_empty());
    assert!(!ledger.path().exists());
}

#[tokio::test]
async fn test_report_exported_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let archive = write_archive(dir.path(), &[("1", old), ("2", old)]);

    let harness = DeletionHarness::new().await;
    harness.mount(&SequentialResponder::statuses(&[200, 403])).await;

    let mut config = harness.config.clone();
    config.deletion.max_retries = 1;
    config.deletion.concurrency = 1;
    config.selection.protected_ids = vec!["99".into()];
    let runner =
        Runner::from_config(config, Arc::new(MemoryLedger::new()), RunControl::new()).unwrap();

    let outcome = runner.run(&archive).await.unwrap();
    let report_dir = dir.path().join("reports");
    let path = runner
        .export_report(&outcome.report, &report_dir)
        .await
        .unwrap();

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("postpurge-report-"));
    assert!(!name.trim_end_matches(".json").contains(':'));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["stats"]["deleted"], 1);
    assert_eq!(report["stats"]["failed"], 1);
    assert_eq!(report["failed_ids"], json!(["2"]));
    assert_eq!(report["config"]["protected_ids"], json!(["99"]));
    assert_eq!(report["config"]["test_mode"], false);
    assert!(report["duration"]["ms"].is_u64());
}

#[tokio::test]
async fn test_plan_rejects_empty_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tweets.js");
    std::fs::write(&path, "window.YTD.tweets.part0 = []").unwrap();

    let result = runner::plan(&PurgeConfig::default(), &path).await;
    assert!(matches!(result, Err(RunError::Archive(_))));
}

#[tokio::test]
async fn test_missing_archive_is_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = runner::plan(&PurgeConfig::default(), &dir.path().join("missing.js")).await;
    assert!(matches!(result, Err(RunError::Archive(_))));
}
