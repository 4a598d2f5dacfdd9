//! Integration tests for batch dispatch and task tracking
//!
//! Providers and image loading are mocked; the task store is the real
//! in-memory JSON store so lifecycle rules are enforced end to end.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{MockProviderBuilder, OrchestratorBuilder, RejectSubmissionStore, SlowProvider, TestFixtures, TestHelpers};
use orchestrator::services::JsonTaskStore;
use orchestrator::{MockImageSource, MockTaskStore, OrchestratorError, SceneOutcome, StoreError, TaskStore};
use providers::{AdapterError, GenerationRequest, StatusReport};
use shared::{FailureCategory, JobStatus, ProviderId, TaskId, TaskStatus, TaskUpdate};

#[tokio::test]
async fn test_intro_batch_runs_to_success() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .succeeds_after(1)
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.dispatch.submitted_count(), 2);
    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(report.failed_count(), 0);

    let stored = orchestrator.store().list_all().await.unwrap();
    assert_eq!(stored.len(), 2);
    TestHelpers::assert_all_succeeded(&stored);

    let scene1 = &orchestrator.store().list_by_scene("Intro", 1).await.unwrap()[0];
    let scene2 = &orchestrator.store().list_by_scene("Intro", 2).await.unwrap()[0];
    assert_eq!(scene1.result_asset.as_deref(), Some("asset://1"));
    assert_eq!(scene2.result_asset.as_deref(), Some("asset://2"));
    assert_ne!(scene1.provider_job_id, scene2.provider_job_id);
    assert_eq!(scene1.poll_count, 2);
}

#[tokio::test]
async fn test_every_ready_scene_gets_one_task() {
    let adapter = MockProviderBuilder::new(ProviderId::Luma)
        .submits_by_scene()
        .succeeds_after(0)
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::LUMA_KEY)
        .build();

    let script = TestFixtures::ready_script("Long", 5);
    let report = orchestrator
        .dispatch_and_track(
            &script,
            &TestFixtures::characters(),
            ProviderId::Luma,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.tasks.len(), 5);
    TestHelpers::assert_all_succeeded(&report.tasks);
    for n in 1..=5 {
        let tasks = orchestrator.store().list_by_scene("Long", n).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].provider, ProviderId::Luma);
    }
}

#[tokio::test]
async fn test_transport_failure_is_isolated_to_its_scene() {
    let attempts = TestHelpers::counter();
    let seen = attempts.clone();

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway)
        .succeeds_after(0)
        .into_mock();
    adapter
        .expect_submit()
        .returning(move |request: &GenerationRequest, _key: &str| {
            if request.narration == "Beat 2." {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(AdapterError::transport("connection reset"))
            } else {
                Ok(TestHelpers::job_for(request))
            }
        });

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::ready_script("Three", 3),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.dispatch.summary(), "2 of 3 submitted");
    assert_eq!(report.succeeded_count(), 2);

    // max_retries = 2 in the fast policy
    assert_eq!(TestHelpers::count(&attempts), 3);

    let failed = &orchestrator.store().list_by_scene("Three", 2).await.unwrap()[0];
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.provider_job_id.is_empty());
    let error = failed.last_error.as_ref().unwrap();
    assert_eq!(error.category, FailureCategory::Transport);
    assert!(error.message.contains("connection reset"));

    let outcome = report
        .dispatch
        .outcomes
        .iter()
        .find(|o| o.scene_number() == 2)
        .unwrap();
    assert!(matches!(
        outcome,
        SceneOutcome::Failed { category: FailureCategory::Transport, .. }
    ));
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let mut adapter = MockProviderBuilder::new(ProviderId::Kling).never_polled().into_mock();
    adapter
        .expect_submit()
        .returning(|_: &GenerationRequest, _: &str| {
            Err(AdapterError::Authentication {
                status: 401,
                body: "invalid key".to_string(),
            })
        })
        .times(2);

    let orchestrator = OrchestratorBuilder::new().with_adapter(adapter, "bad-key").build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Kling,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.dispatch.submitted_count(), 0);
    assert!(report.tasks.is_empty());

    let stored = orchestrator.store().list_all().await.unwrap();
    assert_eq!(stored.len(), 2);
    for task in stored {
        assert_eq!(task.status, TaskStatus::Failed);
        let error = task.last_error.unwrap();
        assert_eq!(error.category, FailureCategory::Auth);
        assert!(error.diagnostic().starts_with("authentication error"));
    }
}

#[tokio::test]
async fn test_provider_reported_failure_keeps_reason() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .status_always(Ok(
            StatusReport::new(JobStatus::Failed, "FAILED").with_failure("content moderation")
        ))
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.failed_count(), 2);
    for task in &report.tasks {
        let error = task.last_error.as_ref().unwrap();
        assert_eq!(error.category, FailureCategory::ProviderSideFailure);
        assert_eq!(error.message, "content moderation");
        assert!(task.result_asset.is_none());
        assert_eq!(task.poll_count, 1);
    }
}

#[tokio::test]
async fn test_status_probe_error_fails_task() {
    let adapter = MockProviderBuilder::new(ProviderId::Minimax)
        .submits_by_scene()
        .status_always(Err(AdapterError::Authentication {
            status: 200,
            body: "status_code 1004".to_string(),
        }))
        .into_mock();
    let orchestrator = OrchestratorBuilder::new().with_adapter(adapter, "mm-key").build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Minimax,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.failed_count(), 2);
    assert!(report
        .tasks
        .iter()
        .all(|t| t.last_error.as_ref().unwrap().category == FailureCategory::Auth));
}

#[tokio::test]
async fn test_success_without_asset_keeps_polling() {
    let probes = TestHelpers::counter();
    let seen = probes.clone();

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).submits_by_scene().into_mock();
    adapter
        .expect_check_status()
        .returning(move |_: &str, _: &str| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(StatusReport::new(JobStatus::Succeeded, "SUCCEEDED"))
            } else {
                Ok(StatusReport::new(JobStatus::Succeeded, "SUCCEEDED").with_asset("asset://late"))
            }
        });

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::ready_script("One", 1),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    let task = &report.tasks[0];
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.result_asset.as_deref(), Some("asset://late"));
    assert_eq!(task.poll_count, 2);
}

#[tokio::test]
async fn test_poll_timeout_fails_with_transport() {
    let adapter = MockProviderBuilder::new(ProviderId::Luma)
        .submits_by_scene()
        .status_always(Ok(StatusReport::new(JobStatus::Processing, "dreaming")))
        .into_mock();

    let mut policy = TestFixtures::fast_policy();
    policy.poll_timeout = Duration::from_millis(30);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::LUMA_KEY)
        .with_policy(policy)
        .build();

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::ready_script("Slow", 1),
            &TestFixtures::characters(),
            ProviderId::Luma,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    let task = &report.tasks[0];
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.poll_count >= 1);
    let error = task.last_error.as_ref().unwrap();
    assert_eq!(error.category, FailureCategory::Transport);
    assert!(error.message.contains("timed out"));
}

#[tokio::test]
async fn test_invalid_scenes_create_no_tasks() {
    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).never_polled().into_mock();
    adapter
        .expect_submit()
        .returning(|request: &GenerationRequest, _: &str| Ok(TestHelpers::job_for(request)))
        .times(1);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();

    let script = TestFixtures::mixed_script();
    let report = orchestrator
        .dispatch(
            &script,
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    // scene 2 is not ready; scenes 3 and 4 are ready but not dispatchable
    assert_eq!(report.ready, 3);
    assert_eq!(report.total, 4);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.submitted_count(), 1);

    let invalid: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match o {
            SceneOutcome::Invalid { scene_number, message } => Some((*scene_number, message.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(invalid.len(), 2);
    assert!(invalid.iter().any(|(n, m)| *n == 3 && m.contains("no reference image")));
    assert!(invalid.iter().any(|(n, m)| *n == 4 && m.contains("unknown character 'Ghost'")));

    for n in 2..=4 {
        assert!(orchestrator.store().list_by_scene("Mixed", n).await.unwrap().is_empty());
    }

    let activity = orchestrator.activity().await;
    assert!(activity
        .entries()
        .iter()
        .any(|e| e.message.contains("validation error")));
}

#[tokio::test]
async fn test_unreadable_image_is_a_validation_failure() {
    let mut images = MockImageSource::new();
    images.expect_load_image().returning(|reference: &str| {
        Err(OrchestratorError::ImageUnavailable {
            reference: reference.to_string(),
            message: "file not found".to_string(),
        })
    });

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).never_polled().into_mock();
    adapter.expect_submit().times(0);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .with_images(images)
        .build();

    let report = orchestrator
        .dispatch(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 0);
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o, SceneOutcome::Invalid { .. })));
    assert!(orchestrator.store().list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unconfigured_provider_is_rejected_up_front() {
    let mut adapter = MockProviderBuilder::new(ProviderId::Luma).never_polled().into_mock();
    adapter.expect_submit().times(0);

    let orchestrator = OrchestratorBuilder::new().with_unconfigured_adapter(adapter).build();

    let err = orchestrator
        .dispatch(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Luma,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::ProviderUnavailable { provider: ProviderId::Luma, .. }
    ));
    assert!(orchestrator.store().list_all().await.unwrap().is_empty());
    assert!(orchestrator.available_providers().await.is_empty());
}

#[tokio::test]
async fn test_scene_in_flight_is_not_dispatched_twice() {
    let submits = TestHelpers::counter();
    let seen = submits.clone();

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).into_mock();
    adapter
        .expect_submit()
        .returning(move |request: &GenerationRequest, _: &str| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(TestHelpers::job_for(request))
        });

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();
    let script = TestFixtures::intro_script();
    let characters = TestFixtures::characters();

    let batch = orchestrator.batch_token();
    let first = orchestrator.dispatch(&script, &characters, ProviderId::Runway, &batch).await.unwrap();
    assert_eq!(first.submitted_count(), 2);

    let second = orchestrator.dispatch(&script, &characters, ProviderId::Runway, &batch).await.unwrap();
    assert_eq!(second.submitted_count(), 0);
    for outcome in &second.outcomes {
        let SceneOutcome::AlreadyInFlight { task_id, .. } = outcome else {
            panic!("expected AlreadyInFlight, got {outcome:?}");
        };
        assert!(first.submitted_task_ids().contains(task_id));
    }

    assert_eq!(TestHelpers::count(&submits), 2);
    assert_eq!(orchestrator.store().list_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_scene_can_be_dispatched_again() {
    let calls = TestHelpers::counter();
    let seen = calls.clone();

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).succeeds_after(0).into_mock();
    adapter
        .expect_submit()
        .returning(move |request: &GenerationRequest, _: &str| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AdapterError::Rejected {
                    message: "prompt rejected".to_string(),
                })
            } else {
                Ok(TestHelpers::job_for(request))
            }
        });

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();
    let script = TestFixtures::ready_script("Retry", 1);
    let characters = TestFixtures::characters();

    let first = orchestrator
        .dispatch_and_track(&script, &characters, ProviderId::Runway, &orchestrator.batch_token())
        .await
        .unwrap();
    assert_eq!(first.dispatch.submitted_count(), 0);

    let second = orchestrator
        .dispatch_and_track(&script, &characters, ProviderId::Runway, &orchestrator.batch_token())
        .await
        .unwrap();
    assert_eq!(second.succeeded_count(), 1);

    let history = orchestrator.store().list_by_scene("Retry", 1).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, TaskStatus::Failed);
    assert_eq!(
        history[0].last_error.as_ref().unwrap().category,
        FailureCategory::ProviderSideFailure
    );
    assert_eq!(history[1].status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_cancelled_batch_dispatches_nothing() {
    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).never_polled().into_mock();
    adapter.expect_submit().times(0);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();
    let batch = orchestrator.batch_token();
    batch.cancel();

    let report = orchestrator
        .dispatch(&TestFixtures::intro_script(), &TestFixtures::characters(), ProviderId::Runway, &batch)
        .await
        .unwrap();

    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o, SceneOutcome::Cancelled { .. })));
    assert!(orchestrator.store().list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_batch_leaves_later_batches_running() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .succeeds_after(0)
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();
    let characters = TestFixtures::characters();

    let first = orchestrator.batch_token();
    let second = orchestrator.batch_token();
    first.cancel();
    assert!(!second.is_cancelled());

    let cancelled = orchestrator
        .dispatch_and_track(&TestFixtures::ready_script("First", 2), &characters, ProviderId::Runway, &first)
        .await
        .unwrap();
    assert_eq!(cancelled.dispatch.submitted_count(), 0);
    assert!(cancelled.tasks.is_empty());

    let report = orchestrator
        .dispatch_and_track(&TestFixtures::ready_script("Second", 2), &characters, ProviderId::Runway, &second)
        .await
        .unwrap();
    assert_eq!(report.dispatch.submitted_count(), 2);
    assert_eq!(report.succeeded_count(), 2);
    assert!(!orchestrator.is_shut_down());

    // A token handed out after the cancellation starts clean as well
    let third = orchestrator
        .dispatch(
            &TestFixtures::ready_script("Third", 1),
            &characters,
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();
    assert_eq!(third.submitted_count(), 1);
}

#[tokio::test]
async fn test_shutdown_cancels_every_batch() {
    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).never_polled().into_mock();
    adapter.expect_submit().times(0);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();
    let running = orchestrator.batch_token();
    orchestrator.shutdown();

    assert!(orchestrator.is_shut_down());
    assert!(running.is_cancelled());
    let later = orchestrator.batch_token();
    assert!(later.is_cancelled());

    let report = orchestrator
        .dispatch(&TestFixtures::intro_script(), &TestFixtures::characters(), ProviderId::Runway, &later)
        .await
        .unwrap();
    assert_eq!(report.submitted_count(), 0);
}

#[tokio::test]
async fn test_cancel_stops_tracking_without_settling() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .never_polled()
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();
    let batch = orchestrator.batch_token();

    let report = orchestrator
        .dispatch(&TestFixtures::intro_script(), &TestFixtures::characters(), ProviderId::Runway, &batch)
        .await
        .unwrap();
    batch.cancel();

    let tasks = orchestrator.track(report.submitted_task_ids(), &batch).await;
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Polling));
    assert_eq!(orchestrator.store().list_non_terminal().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancel_interrupts_poll_wait() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .status_always(Ok(StatusReport::new(JobStatus::Queued, "PENDING")))
        .into_mock();

    let mut policy = TestFixtures::fast_policy();
    policy.poll_interval = Duration::from_secs(60);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .with_policy(policy)
        .build();
    let batch = orchestrator.batch_token();

    let report = orchestrator
        .dispatch(&TestFixtures::ready_script("Wait", 1), &TestFixtures::characters(), ProviderId::Runway, &batch)
        .await
        .unwrap();

    let token = batch.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let tasks = tokio::time::timeout(Duration::from_secs(5), orchestrator.track(report.submitted_task_ids(), &batch))
        .await
        .expect("tracking should stop on cancel");

    assert_eq!(tasks[0].status, TaskStatus::Polling);
    assert_eq!(tasks[0].poll_count, 1);
}

#[tokio::test]
async fn test_submissions_respect_in_flight_limit() {
    let adapter = SlowProvider::new(ProviderId::Luma, Duration::from_millis(40));
    let peak = adapter.peak();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::LUMA_KEY)
        .build();
    assert_eq!(orchestrator.policy().max_in_flight, 2);

    let report = orchestrator
        .dispatch(
            &TestFixtures::ready_script("Crowd", 5),
            &TestFixtures::characters(),
            ProviderId::Luma,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 5);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "{peak} submissions overlapped");
    assert!(peak > 1, "submissions never overlapped");
}

#[tokio::test]
async fn test_reconcile_resumes_and_fails_orphans() {
    let store = JsonTaskStore::in_memory();
    let submitted = store.create("Intro", 1, ProviderId::Runway).await.unwrap();
    store.update(submitted, TaskUpdate::submitted("job-1")).await.unwrap();
    let polling = store.create("Intro", 2, ProviderId::Runway).await.unwrap();
    store.update(polling, TaskUpdate::submitted("job-2")).await.unwrap();
    store.update(polling, TaskUpdate::polling()).await.unwrap();
    let orphan = store.create("Intro", 3, ProviderId::Runway).await.unwrap();

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway)
        .succeeds_after(1)
        .into_mock();
    adapter.expect_submit().times(0);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build_with_store(store);

    let settled = orchestrator.reconcile(&orchestrator.batch_token()).await.unwrap();
    assert_eq!(settled.len(), 3);

    let store = orchestrator.store();
    let orphan = store.get(orphan).await.unwrap().unwrap();
    assert_eq!(orphan.status, TaskStatus::Failed);
    assert_eq!(orphan.last_error.unwrap().category, FailureCategory::Transport);

    let first = store.get(submitted).await.unwrap().unwrap();
    assert_eq!(first.result_asset.as_deref(), Some("asset://1"));
    let second = store.get(polling).await.unwrap().unwrap();
    assert_eq!(second.result_asset.as_deref(), Some("asset://2"));

    assert!(store.list_non_terminal().await.unwrap().is_empty());
    assert!(orchestrator.reconcile(&orchestrator.batch_token()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_without_credential_fails_with_auth() {
    let store = JsonTaskStore::in_memory();
    let task_id = store.create("Intro", 1, ProviderId::Kling).await.unwrap();
    store.update(task_id, TaskUpdate::submitted("kling-7")).await.unwrap();

    let adapter = MockProviderBuilder::new(ProviderId::Kling).never_polled().into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_unconfigured_adapter(adapter)
        .build_with_store(store);

    let settled = orchestrator.reconcile(&orchestrator.batch_token()).await.unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].status, TaskStatus::Failed);
    assert_eq!(settled[0].last_error.as_ref().unwrap().category, FailureCategory::Auth);
}

#[tokio::test]
async fn test_store_failure_is_reported_per_scene() {
    let mut store = MockTaskStore::new();
    store.expect_list_by_scene().returning(|_: &str, _: u32| Ok(Vec::new()));
    store
        .expect_create()
        .returning(|_: &str, _: u32, _: ProviderId| {
            Err(StoreError::InvariantViolation {
                task_id: TaskId::new(),
                message: "disk full".to_string(),
            })
        });

    let mut adapter = MockProviderBuilder::new(ProviderId::Runway).never_polled().into_mock();
    adapter.expect_submit().times(0);

    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build_with_store(store);

    let report = orchestrator
        .dispatch(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    for outcome in &report.outcomes {
        match outcome {
            SceneOutcome::StoreFailed { task_id, provider_job_id, message, .. } => {
                assert!(task_id.is_none());
                assert!(provider_job_id.is_none());
                assert!(message.contains("disk full"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_unrecorded_submission_does_not_sink_the_batch() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .succeeds_after(0)
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build_with_store(RejectSubmissionStore::new(1));

    let report = orchestrator
        .dispatch_and_track(
            &TestFixtures::ready_script("Three", 3),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    assert_eq!(report.dispatch.submitted_count(), 2);
    assert_eq!(report.succeeded_count(), 2);
    let mut settled: Vec<u32> = report.tasks.iter().map(|t| t.scene_number).collect();
    settled.sort_unstable();
    assert_eq!(settled, vec![2, 3]);

    let first = report
        .dispatch
        .outcomes
        .iter()
        .find(|o| o.scene_number() == 1)
        .unwrap();
    assert!(matches!(
        first,
        SceneOutcome::StoreFailed { provider_job_id: Some(job), task_id: Some(_), .. } if job == "job-1"
    ));

    // The job id survives on the closed task instead of being lost
    let scene1 = &orchestrator.store().list_by_scene("Three", 1).await.unwrap()[0];
    assert_eq!(scene1.status, TaskStatus::Failed);
    assert!(scene1.last_error.as_ref().unwrap().message.contains("job-1"));
    assert!(orchestrator.store().list_non_terminal().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_activity_records_batch_progress() {
    let adapter = MockProviderBuilder::new(ProviderId::Runway)
        .submits_by_scene()
        .succeeds_after(0)
        .into_mock();
    let orchestrator = OrchestratorBuilder::new()
        .with_adapter(adapter, TestFixtures::RUNWAY_KEY)
        .build();

    orchestrator
        .dispatch_and_track(
            &TestFixtures::intro_script(),
            &TestFixtures::characters(),
            ProviderId::Runway,
            &orchestrator.batch_token(),
        )
        .await
        .unwrap();

    let activity = orchestrator.activity().await;
    // queued, submitted and awaiting per scene, the batch summary, then one success each
    assert_eq!(activity.len(), 9);
    let entries = activity.entries();
    assert!(entries[0].message.contains("succeeded on runway"));
    assert!(entries
        .iter()
        .any(|e| e.message == "'Intro': 2 of 2 submitted to runway"));
}
