mod common;

use std::time::Duration;

use clipfetch::jobs::{OrchestratorError, ProgressStatus};
use clipfetch::store::HistoryStore;
use common::{
    ScriptedFetcher, Step, collect_until_terminal, harness, harness_with_push_delay, next_event,
    request, wait_until, wait_until_removed,
};

#[tokio::test]
async fn test_successful_download_records_history() {
    let h = harness(ScriptedFetcher::new([Step::Succeed]), 5);
    let mut rx = h.progress.subscribe();

    let job_id = h.orchestrator.start_download(request("job-ok")).unwrap();
    assert_eq!(job_id, "job-ok");

    let events = collect_until_terminal(&mut rx, "job-ok").await;
    let last = events.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Completed);
    assert_eq!(last.percent, Some(100.0));
    assert_eq!(last.message.as_deref(), Some("✓ Download completed successfully!"));

    assert!(!h.registry.contains("job-ok"));
    assert_eq!(h.fetcher.calls(), 1);

    let records = h.history.load();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "clip");
    assert_eq!(records[0].format_label, "1080p video");
    assert_eq!(records[0].thumbnail_path, "https://img.example/clip.jpg");
    assert_eq!(records[0].filesize_bytes, 4_200_000);

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.jobs_started, 1);
    assert_eq!(metrics.jobs_completed, 1);
}

#[tokio::test]
async fn test_fetch_uses_saved_settings() {
    let h = harness(ScriptedFetcher::new([Step::Succeed]), 5);
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-settings")).unwrap();
    collect_until_terminal(&mut rx, "job-settings").await;

    let sent = h.fetcher.last_request().unwrap();
    assert_eq!(sent.output_dir, h.dir.path().join("downloads"));
    assert_eq!(sent.target, "https://video.example/watch?v=abc");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let h = harness(
        ScriptedFetcher::new([
            Step::Fail("ERROR: Unable to download webpage: connection reset"),
            Step::Fail("ERROR: Read timed out"),
            Step::Succeed,
        ]),
        5,
    );
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-retry")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-retry").await;

    let retries: Vec<_> = events
        .iter()
        .filter(|e| e.status == ProgressStatus::Retrying)
        .collect();
    assert_eq!(retries.len(), 2);
    assert_eq!(retries[0].retry_count, Some(2));
    assert_eq!(retries[0].message.as_deref(), Some("Retry attempt 2 of 5..."));
    assert_eq!(retries[1].retry_count, Some(3));

    assert_eq!(events.last().unwrap().status, ProgressStatus::Completed);
    assert_eq!(h.fetcher.calls(), 3);
    assert_eq!(h.history.load().len(), 1);
    assert_eq!(h.metrics.snapshot().retries_scheduled, 2);
}

#[tokio::test]
async fn test_exhausted_retries_report_classified_error() {
    let h = harness(
        ScriptedFetcher::new([
            Step::Fail("ERROR: HTTP Error 403: Forbidden"),
            Step::Fail("ERROR: HTTP Error 403: Forbidden"),
            Step::Fail("ERROR: HTTP Error 403: Forbidden"),
        ]),
        3,
    );
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-403")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-403").await;

    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(
        events.iter().filter(|e| e.status == ProgressStatus::Retrying).count(),
        2
    );

    let error = terminal[0];
    assert_eq!(error.status, ProgressStatus::Error);
    assert_eq!(
        error.message.as_deref(),
        Some(
            "Access denied. The video might be private, region-blocked, or require authentication. Try adding credentials in Settings."
        )
    );
    assert!(error.technical_error.as_deref().unwrap().contains("403"));
    assert_eq!(error.retry_count, Some(3));

    assert_eq!(h.fetcher.calls(), 3);
    assert!(h.history.load().is_empty());
    assert!(!h.registry.contains("job-403"));
    assert_eq!(h.metrics.snapshot().jobs_failed, 1);
}

#[tokio::test]
async fn test_unknown_failure_keeps_excerpt() {
    let h = harness(ScriptedFetcher::new([Step::Fail("something odd happened")]), 1);
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-odd")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-odd").await;

    let error = events.last().unwrap();
    assert_eq!(error.status, ProgressStatus::Error);
    assert_eq!(
        error.message.as_deref(),
        Some("Download failed: something odd happened")
    );
}

#[tokio::test]
async fn test_cancel_before_first_attempt() {
    let h = harness(ScriptedFetcher::new([Step::Succeed]), 5);
    let mut rx = h.progress.subscribe();

    // Single-threaded runtime: the job task cannot run before the cancel lands
    h.orchestrator.start_download(request("job-early")).unwrap();
    h.orchestrator.cancel_download("job-early").unwrap();

    let events = collect_until_terminal(&mut rx, "job-early").await;
    let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![ProgressStatus::Cancelling, ProgressStatus::Cancelled]
    );

    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.history.load().is_empty());
    assert!(!h.registry.contains("job-early"));
}

#[tokio::test]
async fn test_cancel_during_transfer() {
    let h = harness(ScriptedFetcher::new([Step::Block]), 5);
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-mid")).unwrap();

    let first = next_event(&mut rx, "job-mid").await;
    assert_eq!(first.status, ProgressStatus::Downloading);

    h.orchestrator.cancel_download("job-mid").unwrap();
    let events = collect_until_terminal(&mut rx, "job-mid").await;

    let last = events.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Cancelled);
    assert_eq!(last.message.as_deref(), Some("Download cancelled by user"));
    assert!(events.iter().all(|e| e.status != ProgressStatus::Retrying));

    assert_eq!(h.fetcher.calls(), 1);
    assert!(h.history.load().is_empty());
    assert!(!h.registry.contains("job-mid"));
    assert_eq!(h.metrics.snapshot().jobs_cancelled, 1);
}

#[tokio::test]
async fn test_cancel_racing_success_wins() {
    let h = harness(
        ScriptedFetcher::new([Step::SucceedAfterCancel("job-race")]),
        5,
    );
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-race")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-race").await;

    assert_eq!(events.last().unwrap().status, ProgressStatus::Cancelled);
    assert!(events.iter().all(|e| e.status != ProgressStatus::Completed));
    assert!(h.history.load().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_after_fetch_succeeded_is_rejected() {
    let h = harness_with_push_delay(
        ScriptedFetcher::new([Step::Succeed]),
        5,
        Duration::from_millis(300),
    );
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-late")).unwrap();

    // The job leaves the registry before the slow history write starts
    wait_until_removed(&h.registry, "job-late").await;
    assert_eq!(
        h.orchestrator.cancel_download("job-late"),
        Err(OrchestratorError::JobNotFound("job-late".to_string()))
    );

    let events = collect_until_terminal(&mut rx, "job-late").await;
    let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![ProgressStatus::Completed]);
    assert_eq!(h.history.load().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_acknowledged_cancel_is_never_followed_by_completion() {
    let h = harness_with_push_delay(
        ScriptedFetcher::new([Step::Progress { ticks: 2 }]),
        5,
        Duration::from_millis(300),
    );
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-window")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let acknowledged = h.orchestrator.cancel_download("job-window").is_ok();

    let events = collect_until_terminal(&mut rx, "job-window").await;
    let last = events.last().unwrap().status;
    if acknowledged {
        assert_eq!(last, ProgressStatus::Cancelled);
        assert!(h.history.load().is_empty());
    } else {
        assert_eq!(last, ProgressStatus::Completed);
        assert!(events.iter().all(|e| e.status != ProgressStatus::Cancelling));
    }
}

#[tokio::test]
async fn test_killed_process_counts_as_cancelled() {
    let h = harness(ScriptedFetcher::new([Step::Fail("yt-dlp was killed")]), 5);
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-killed")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-killed").await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, ProgressStatus::Cancelled);
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_duplicate_job_id_rejected() {
    let h = harness(ScriptedFetcher::new([Step::Block]), 5);
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-dup")).unwrap();
    let err = h.orchestrator.start_download(request("job-dup")).unwrap_err();
    assert_eq!(err, OrchestratorError::DuplicateJob("job-dup".to_string()));

    h.orchestrator.cancel_download("job-dup").unwrap();
    collect_until_terminal(&mut rx, "job-dup").await;

    // The id is free again once the first job is gone
    h.orchestrator.start_download(request("job-dup")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-dup").await;
    assert_eq!(events.last().unwrap().status, ProgressStatus::Completed);
}

#[tokio::test]
async fn test_second_cancel_reports_not_found() {
    let h = harness(ScriptedFetcher::new([Step::Block]), 5);
    let mut rx = h.progress.subscribe();

    assert_eq!(
        h.orchestrator.cancel_download("nope"),
        Err(OrchestratorError::JobNotFound("nope".to_string()))
    );

    h.orchestrator.start_download(request("job-twice")).unwrap();
    next_event(&mut rx, "job-twice").await;

    assert!(h.orchestrator.cancel_download("job-twice").is_ok());
    assert!(h.orchestrator.cancel_download("job-twice").is_err());

    let events = collect_until_terminal(&mut rx, "job-twice").await;
    assert_eq!(
        events.iter().filter(|e| e.status == ProgressStatus::Cancelling).count(),
        1
    );

    // Nothing else arrives for the job once it has terminated
    assert!(h.orchestrator.cancel_download("job-twice").is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(event) = rx.try_recv() {
        assert_ne!(event.job_id, "job-twice", "late event: {:?}", event);
    }
}

#[tokio::test]
async fn test_progress_is_forwarded() {
    let h = harness(ScriptedFetcher::new([Step::Progress { ticks: 4 }]), 5);
    let mut rx = h.progress.subscribe();

    h.orchestrator.start_download(request("job-progress")).unwrap();
    let events = collect_until_terminal(&mut rx, "job-progress").await;

    let percents: Vec<_> = events
        .iter()
        .filter(|e| e.status == ProgressStatus::Downloading)
        .map(|e| e.percent.unwrap())
        .collect();
    assert_eq!(percents, vec![25.0, 50.0, 75.0, 100.0]);

    let processing = events
        .iter()
        .find(|e| e.status == ProgressStatus::Processing)
        .unwrap();
    assert_eq!(
        processing.message.as_deref(),
        Some("Merging video and audio streams...")
    );
    assert_eq!(events.last().unwrap().status, ProgressStatus::Completed);
}

#[tokio::test]
async fn test_job_survives_without_listeners() {
    let h = harness(ScriptedFetcher::new([Step::Progress { ticks: 3 }]), 5);
    assert_eq!(h.progress.subscriber_count(), 0);

    h.orchestrator.start_download(request("job-alone")).unwrap();
    wait_until(|| h.metrics.snapshot().jobs_completed == 1).await;

    assert_eq!(h.history.load().len(), 1);
    assert_eq!(h.metrics.snapshot().jobs_completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_jobs_each_complete() {
    let h = harness(ScriptedFetcher::new([]), 5);
    let mut rx = h.progress.subscribe();

    let ids: Vec<String> = (0..8).map(|i| format!("job-{}", i)).collect();
    for id in &ids {
        h.orchestrator.start_download(request(id)).unwrap();
    }

    let mut completed = 0;
    while completed < ids.len() {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for completions")
            .unwrap();
        if event.status == ProgressStatus::Completed {
            completed += 1;
        }
    }

    assert!(h.registry.is_empty());
    assert_eq!(h.history.load().len(), 8);
    assert_eq!(h.fetcher.calls(), 8);
}
