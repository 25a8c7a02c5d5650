//! Integration tests for the download orchestrator.
//!
//! Uses simulated engines so no external program or network is involved.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use spdl_core::{
    ClassifiedError, DownloadError, DownloadRequest, EngineConfig, EngineEvent, FetchEngine,
    Orchestrator, ProgressEvent, ProgressSink, TerminalSignal,
};
use tempfile::TempDir;
use tokio::sync::{Barrier, Notify, mpsc::UnboundedSender};
use tokio_util::sync::CancellationToken;

const MANIFEST_URL: &str = "https://tenant.sharepoint.com/_api/v2.1/videomanifest.ashx?provider=spo&docid=ABC123&part=index&format=dash";

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RecordingSink {
    fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    fn terminal_events(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(ProgressEvent::is_terminal)
            .collect()
    }
}

fn progress(downloaded: u64, total: u64) -> EngineEvent {
    EngineEvent::Progress {
        downloaded_bytes: downloaded,
        total_bytes: Some(total),
        total_bytes_estimate: None,
        eta: Some(1),
        speed: Some(1024.0),
        fragment_index: None,
        fragment_count: None,
    }
}

fn output_file(config: &EngineConfig, name: &str) -> PathBuf {
    config.output_dir.join(name)
}

/// Writes a file into the output directory and reports it.
struct SavingEngine;

#[async_trait]
impl FetchEngine for SavingEngine {
    type Handle = EngineConfig;

    fn configure(&self, config: &EngineConfig) -> Self::Handle {
        config.clone()
    }

    async fn execute(
        &self,
        config: Self::Handle,
        events: UnboundedSender<EngineEvent>,
        _cancel: CancellationToken,
    ) -> TerminalSignal {
        let path = output_file(&config, "Lecture [ABC123].mp4");
        let _ = events.send(EngineEvent::Destination(path.clone()));
        let _ = events.send(progress(512, 1024));
        let _ = events.send(progress(1024, 1024));
        fs::write(&path, b"video").unwrap();
        TerminalSignal::Success { output: Some(path) }
    }
}

/// Fails the way yt-dlp does when the session is not signed in.
struct UnauthorizedEngine;

#[async_trait]
impl FetchEngine for UnauthorizedEngine {
    type Handle = ();

    fn configure(&self, _config: &EngineConfig) -> Self::Handle {}

    async fn execute(
        &self,
        _handle: Self::Handle,
        events: UnboundedSender<EngineEvent>,
        _cancel: CancellationToken,
    ) -> TerminalSignal {
        let _ = events.send(EngineEvent::Error(
            "Unable to download webpage: HTTP Error 401: Unauthorized".to_string(),
        ));
        TerminalSignal::Failure {
            http_status: Some(401),
            diagnostics: "ERROR: [generic] Unable to download webpage: HTTP Error 401: Unauthorized"
                .to_string(),
        }
    }
}

/// Blocks until released, then reports success.
struct GatedEngine {
    gate: Arc<Notify>,
}

#[async_trait]
impl FetchEngine for GatedEngine {
    type Handle = EngineConfig;

    fn configure(&self, config: &EngineConfig) -> Self::Handle {
        config.clone()
    }

    async fn execute(
        &self,
        config: Self::Handle,
        _events: UnboundedSender<EngineEvent>,
        _cancel: CancellationToken,
    ) -> TerminalSignal {
        self.gate.notified().await;
        TerminalSignal::Success {
            output: Some(output_file(&config, &config.output_template)),
        }
    }
}

/// Completes only when two executions overlap.
struct RendezvousEngine {
    barrier: Arc<Barrier>,
}

#[async_trait]
impl FetchEngine for RendezvousEngine {
    type Handle = EngineConfig;

    fn configure(&self, config: &EngineConfig) -> Self::Handle {
        config.clone()
    }

    async fn execute(
        &self,
        config: Self::Handle,
        _events: UnboundedSender<EngineEvent>,
        _cancel: CancellationToken,
    ) -> TerminalSignal {
        self.barrier.wait().await;
        TerminalSignal::Success {
            output: Some(output_file(&config, &config.output_template)),
        }
    }
}

/// Keeps reporting progress until canceled.
struct StreamingEngine;

#[async_trait]
impl FetchEngine for StreamingEngine {
    type Handle = ();

    fn configure(&self, _config: &EngineConfig) -> Self::Handle {}

    async fn execute(
        &self,
        _handle: Self::Handle,
        events: UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> TerminalSignal {
        let _ = events.send(progress(100, 1000));
        cancel.cancelled().await;
        let _ = events.send(progress(200, 1000));
        TerminalSignal::Canceled
    }
}

fn request_in(dir: &Path) -> DownloadRequest {
    DownloadRequest::new(MANIFEST_URL, dir)
}

async fn wait_for_reservation<E: FetchEngine>(orchestrator: &Orchestrator<E>) {
    while orchestrator.reservations().is_empty() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_unauthorized_engine_yields_auth_required_and_no_file() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(UnauthorizedEngine);
    let sink = RecordingSink::default();

    let result = orchestrator
        .run(&request_in(dir.path()), &sink, &CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(DownloadError::Classified(ClassifiedError::AuthRequired))
    );
    assert_eq!(
        sink.terminal_events(),
        vec![ProgressEvent::Failed(ClassifiedError::AuthRequired)]
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(orchestrator.reservations().is_empty());
}

#[tokio::test]
async fn test_success_reports_engine_path_once() {
    let dir = TempDir::new().unwrap();
    let expected = dir.path().join("Lecture [ABC123].mp4");
    let orchestrator = Orchestrator::new(SavingEngine);
    let sink = RecordingSink::default();

    let result = orchestrator
        .run(&request_in(dir.path()), &sink, &CancellationToken::new())
        .await;

    assert_eq!(result, Ok(expected.clone()));
    assert!(expected.is_file());

    let events = sink.events();
    assert_eq!(
        sink.terminal_events(),
        vec![ProgressEvent::Completed(expected)]
    );
    assert!(events.last().is_some_and(ProgressEvent::is_terminal));
    assert!(events.contains(&ProgressEvent::Fraction {
        percent: 50.0,
        eta: Some(1)
    }));
    assert!(events.contains(&ProgressEvent::Fraction {
        percent: 100.0,
        eta: Some(1)
    }));
}

#[tokio::test]
async fn test_concurrent_run_on_same_target_is_busy() {
    let dir = TempDir::new().unwrap();
    let gate = Arc::new(Notify::new());
    let orchestrator = Orchestrator::new(GatedEngine {
        gate: Arc::clone(&gate),
    });
    let request = request_in(dir.path()).with_output_name("lecture");
    let first_sink = RecordingSink::default();
    let second_sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let first = orchestrator.run(&request, &first_sink, &cancel);
    let second = async {
        wait_for_reservation(&orchestrator).await;
        let result = orchestrator.run(&request, &second_sink, &cancel).await;
        gate.notify_one();
        result
    };
    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(first, second)
    })
    .await
    .unwrap();

    assert!(matches!(second, Err(DownloadError::Busy { .. })));
    assert!(second_sink.events().is_empty());
    assert!(first.is_ok());
    assert_eq!(first_sink.terminal_events().len(), 1);
    assert!(orchestrator.reservations().is_empty());
}

/// Runs `first` behind a gate and `second` once `first` holds its reservation.
async fn run_overlapping(
    first: &DownloadRequest,
    second: &DownloadRequest,
) -> (Result<PathBuf, DownloadError>, Result<PathBuf, DownloadError>) {
    let gate = Arc::new(Notify::new());
    let orchestrator = Orchestrator::new(GatedEngine {
        gate: Arc::clone(&gate),
    });
    let cancel = CancellationToken::new();
    let first_sink = RecordingSink::default();
    let second_sink = RecordingSink::default();

    let first_run = orchestrator.run(first, &first_sink, &cancel);
    let second_run = async {
        wait_for_reservation(&orchestrator).await;
        let result = orchestrator.run(second, &second_sink, &cancel).await;
        gate.notify_one();
        result
    };
    let results = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(first_run, second_run)
    })
    .await
    .unwrap();
    assert!(orchestrator.reservations().is_empty());
    results
}

#[tokio::test]
async fn test_bare_name_and_merge_extension_collide() {
    let dir = TempDir::new().unwrap();
    let bare = request_in(dir.path()).with_output_name("lecture");
    let explicit = request_in(dir.path()).with_output_name("lecture.mp4");

    let (first, second) = run_overlapping(&bare, &explicit).await;

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(DownloadError::Busy { target }) if target.ends_with("lecture.mp4")
    ));
}

#[tokio::test]
async fn test_concurrent_run_on_same_url_without_name_is_busy() {
    let dir = TempDir::new().unwrap();
    let request = request_in(dir.path());

    let (first, second) = run_overlapping(&request, &request).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(DownloadError::Busy { .. })));
}

#[tokio::test]
async fn test_same_url_into_other_directory_is_not_busy() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(RendezvousEngine {
        barrier: Arc::new(Barrier::new(2)),
    });
    let first_request = request_in(first_dir.path());
    let second_request = request_in(second_dir.path());
    let first_sink = RecordingSink::default();
    let second_sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            orchestrator.run(&first_request, &first_sink, &cancel),
            orchestrator.run(&second_request, &second_sink, &cancel),
        )
    })
    .await
    .unwrap();

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_concurrent_runs_on_distinct_targets_both_complete() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(RendezvousEngine {
        barrier: Arc::new(Barrier::new(2)),
    });
    let first_request = request_in(dir.path()).with_output_name("part one");
    let second_request = request_in(dir.path()).with_output_name("part two");
    let first_sink = RecordingSink::default();
    let second_sink = RecordingSink::default();
    let cancel = CancellationToken::new();

    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            orchestrator.run(&first_request, &first_sink, &cancel),
            orchestrator.run(&second_request, &second_sink, &cancel),
        )
    })
    .await
    .unwrap();

    assert_eq!(first, Ok(dir.path().join("part one.%(ext)s")));
    assert_eq!(second, Ok(dir.path().join("part two.%(ext)s")));
}

#[tokio::test]
async fn test_reservation_is_released_after_failure() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(UnauthorizedEngine);
    let request = request_in(dir.path()).with_output_name("lecture");

    for _ in 0..2 {
        let result = orchestrator
            .run(&request, &RecordingSink::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DownloadError::Classified(_))));
    }
}

#[tokio::test]
async fn test_cancel_mid_download_stops_relay_and_never_completes() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(StreamingEngine);
    let cancel = CancellationToken::new();
    let events = Mutex::new(Vec::new());
    let sink = |event: ProgressEvent| {
        if matches!(event, ProgressEvent::Fraction { .. }) {
            cancel.cancel();
        }
        events.lock().unwrap().push(event);
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run(&request_in(dir.path()), &sink, &cancel),
    )
    .await
    .unwrap();

    assert_eq!(
        result,
        Err(DownloadError::Classified(ClassifiedError::Canceled))
    );
    assert_eq!(
        events.into_inner().unwrap(),
        vec![
            ProgressEvent::Fraction {
                percent: 10.0,
                eta: Some(1)
            },
            ProgressEvent::Failed(ClassifiedError::Canceled),
        ]
    );
    assert!(orchestrator.reservations().is_empty());
}
