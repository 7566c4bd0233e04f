//! The batch control loop: execution, partial failure, retries, finalization

use chrono::Utc;
use std::sync::Arc;

use crate::common::fixtures::*;
use sceneforge::{BatchStatus, ItemStatus, ReferenceImage};

#[tokio::test]
async fn test_full_batch_completes_and_is_billed() {
    let generator = Arc::new(ScriptedGenerator::succeeding());
    let (orchestrator, store) = orchestrator(test_config(), generator.clone());

    let outcome = orchestrator
        .submit_batch(live_request(
            "u1",
            vec![item("s1", "p1", 2), item("s2", "p2", 1)],
        ))
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert!((outcome.estimated_cost - 0.3).abs() < 1e-9);
    assert_eq!(outcome.actual_cost, Some(outcome.estimated_cost));
    assert_eq!(generator.total_calls(), 3);

    let job = orchestrator
        .get_batch_status(&outcome.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.progress, 1.0);
    assert!(job.items.iter().all(|i| i.status == ItemStatus::Completed));
    assert_eq!(job.items[0].outputs.len(), 2);
    assert_eq!(job.items[1].outputs.len(), 1);

    // Spend was booked and one audit line was appended for today
    assert!((orchestrator.budget().spent_today("u1").await - 0.3).abs() < 1e-9);
    let lines = store.ledger_lines(Utc::now().date_naive());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].batch_id, outcome.batch_id);
    assert_eq!(lines[0].user_id, "u1");
    assert_eq!(lines[0].image_count, 3);
    assert!((lines[0].cost - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_one_fatal_item_does_not_abort_its_siblings() {
    let generator = Arc::new(
        ScriptedGenerator::succeeding().behavior("poison prompt", GenBehavior::FailFatal),
    );
    let (orchestrator, _store) = orchestrator(test_config(), generator.clone());

    let outcome = orchestrator
        .submit_batch(live_request(
            "u1",
            vec![
                item("s1", "p1", 1),
                item("s2", "p2", 1),
                item("s3", "poison prompt", 1),
                item("s4", "p4", 1),
                item("s5", "p5", 1),
            ],
        ))
        .await
        .unwrap();
    assert!(outcome.accepted);

    let job = orchestrator
        .get_batch_status(&outcome.batch_id)
        .await
        .unwrap()
        .unwrap();

    // The loop finished, so the batch is completed; the failure stays
    // visible at item granularity.
    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.progress, 1.0);

    for scene in ["s1", "s2", "s4", "s5"] {
        let state = job.items.iter().find(|i| i.scene_id == scene).unwrap();
        assert_eq!(state.status, ItemStatus::Completed, "{} must complete", scene);
    }
    let failed = job.items.iter().find(|i| i.scene_id == "s3").unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);
    assert!(failed.error.as_ref().unwrap().contains("Invalid prompt"));
    assert!(failed.outputs.is_empty());
}

#[tokio::test]
async fn test_failed_items_are_not_billed() {
    let mut config = test_config();
    config.budget.cost_per_image = 0.1;

    let generator = Arc::new(
        ScriptedGenerator::succeeding().behavior("broken", GenBehavior::FailRetryable),
    );
    let (orchestrator, store) = orchestrator(config, generator);

    let outcome = orchestrator
        .submit_batch(live_request(
            "u1",
            vec![item("s1", "fine", 2), item("s2", "broken", 2)],
        ))
        .await
        .unwrap();

    // Estimated all four variants, billed only the completed item's two
    assert!((outcome.estimated_cost - 0.4).abs() < 1e-9);
    assert_eq!(outcome.actual_cost, Some(0.2));
    assert!((orchestrator.budget().spent_today("u1").await - 0.2).abs() < 1e-9);

    let lines = store.ledger_lines(Utc::now().date_naive());
    assert_eq!(lines[0].image_count, 2);
}

#[tokio::test]
async fn test_retryable_failure_attempted_exactly_max_attempts() {
    let generator = Arc::new(
        ScriptedGenerator::succeeding().behavior("flappy", GenBehavior::FailRetryable),
    );
    let (orchestrator, _store) = orchestrator(test_config(), generator.clone());

    let outcome = orchestrator
        .submit_batch(live_request("u1", vec![item("s1", "flappy", 1)]))
        .await
        .unwrap();

    // max_attempts is 3 in the test config
    assert_eq!(generator.calls_for("flappy"), 3);

    let job = orchestrator
        .get_batch_status(&outcome.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.items[0].status, ItemStatus::Failed);
    assert!(job.items[0].error.as_ref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_transient_failures_recover_within_the_attempt_budget() {
    let generator = Arc::new(
        ScriptedGenerator::succeeding().behavior("wobbly", GenBehavior::Flaky { failures: 2 }),
    );
    let (orchestrator, _store) = orchestrator(test_config(), generator.clone());

    let outcome = orchestrator
        .submit_batch(live_request("u1", vec![item("s1", "wobbly", 1)]))
        .await
        .unwrap();

    assert_eq!(generator.calls_for("wobbly"), 3);
    let job = orchestrator
        .get_batch_status(&outcome.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.items[0].status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_fatal_failure_is_not_retried() {
    let generator =
        Arc::new(ScriptedGenerator::succeeding().behavior("bad", GenBehavior::FailFatal));
    let (orchestrator, _store) = orchestrator(test_config(), generator.clone());

    orchestrator
        .submit_batch(live_request("u1", vec![item("s1", "bad", 1)]))
        .await
        .unwrap();

    assert_eq!(generator.calls_for("bad"), 1);
}

#[tokio::test]
async fn test_sheet_rows_mirror_item_lifecycle() {
    let sink = Arc::new(RecordingSink::new());
    let generator = Arc::new(
        ScriptedGenerator::succeeding().behavior("poison", GenBehavior::FailFatal),
    );
    let store = Arc::new(sceneforge::MemoryStore::new());
    let orchestrator = sceneforge::Orchestrator::new(
        test_config(),
        store,
        generator,
        Arc::new(FreshResolver),
        sink.clone(),
    );

    let mut request = live_request("u1", vec![item("s1", "fine", 1), item("s2", "poison", 1)]);
    request.sheet_id = Some("sheet-42".to_string());
    orchestrator.submit_batch(request).await.unwrap();

    let updates = sink.updates();
    // running + terminal for each of the two items
    assert_eq!(updates.len(), 4);
    assert!(updates.iter().all(|(sheet, _, _)| sheet == "sheet-42"));

    let s1_final = &updates[1];
    assert_eq!(s1_final.1, "s1");
    assert_eq!(s1_final.2.get("status").unwrap(), "completed");

    let s2_final = &updates[3];
    assert_eq!(s2_final.1, "s2");
    assert_eq!(s2_final.2.get("status").unwrap(), "failed");
    assert!(s2_final.2.contains_key("error"));
}

#[tokio::test]
async fn test_sink_failures_never_fail_the_batch() {
    let generator = Arc::new(ScriptedGenerator::succeeding());
    let store = Arc::new(sceneforge::MemoryStore::new());
    let orchestrator = sceneforge::Orchestrator::new(
        test_config(),
        store,
        generator,
        Arc::new(FreshResolver),
        Arc::new(FailingSink),
    );

    let mut request = live_request("u1", vec![item("s1", "p", 1)]);
    request.sheet_id = Some("sheet-1".to_string());

    let outcome = orchestrator.submit_batch(request).await.unwrap();
    assert!(outcome.accepted);

    let job = orchestrator
        .get_batch_status(&outcome.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_stale_references_are_rederived_and_broken_ones_dropped() {
    let mut config = test_config();
    // Treat every batch as stale so refresh kicks in immediately
    config.references.staleness_secs = 0;

    let generator = Arc::new(ScriptedGenerator::succeeding());
    let store = Arc::new(sceneforge::MemoryStore::new());
    let orchestrator = sceneforge::Orchestrator::new(
        config,
        store,
        generator.clone(),
        Arc::new(PickyResolver {
            broken: "char/hero-v2".to_string(),
        }),
        Arc::new(sceneforge::NoopSink),
    );

    let mut request = live_request("u1", vec![item("s1", "p", 1)]);
    request.references = vec![
        ReferenceImage {
            url: "https://signed.example/char/hero-v1?sig=old".to_string(),
            locator: "char/hero-v1".to_string(),
        },
        ReferenceImage {
            url: "https://signed.example/char/hero-v2?sig=old".to_string(),
            locator: "char/hero-v2".to_string(),
        },
    ];

    let outcome = orchestrator.submit_batch(request).await.unwrap();
    assert!(outcome.accepted);

    // Generation saw the one refreshable reference with a fresh signature;
    // the broken one was dropped rather than failing the item.
    let seen = generator.seen_references();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        vec!["https://signed.example/char/hero-v1?sig=fresh".to_string()]
    );

    let job = orchestrator
        .get_batch_status(&outcome.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.items[0].status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_fresh_batches_use_original_reference_urls() {
    let generator = Arc::new(ScriptedGenerator::succeeding());
    let (orchestrator, _store) = orchestrator(test_config(), generator.clone());

    let mut request = live_request("u1", vec![item("s1", "p", 1)]);
    request.references = vec![ReferenceImage {
        url: "https://signed.example/char/hero?sig=original".to_string(),
        locator: "char/hero".to_string(),
    }];

    orchestrator.submit_batch(request).await.unwrap();

    let seen = generator.seen_references();
    assert_eq!(
        seen[0],
        vec!["https://signed.example/char/hero?sig=original".to_string()]
    );
}

#[tokio::test]
async fn test_each_batch_appends_its_own_ledger_line() {
    let generator = Arc::new(ScriptedGenerator::succeeding());
    let (orchestrator, store) = orchestrator(test_config(), generator);

    for i in 0..3 {
        orchestrator
            .submit_batch(live_request("u1", vec![item("s1", &format!("p{}", i), 1)]))
            .await
            .unwrap();
    }

    let lines = store.ledger_lines(Utc::now().date_naive());
    assert_eq!(lines.len(), 3);
    // Lines are append-only and independent
    let ids: std::collections::HashSet<_> = lines.iter().map(|l| l.batch_id.clone()).collect();
    assert_eq!(ids.len(), 3);
}
