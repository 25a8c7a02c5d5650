//! Drives one download request through a [`FetchEngine`].
//!
//! # Flow
//!
//! 1. Validate the request and reserve its [`OutputTarget`].
//! 2. Build the [`EngineConfig`] and configure the engine.
//! 3. Run the engine while relaying its events to the [`ProgressSink`].
//! 4. Map the engine's [`TerminalSignal`] to a path or a [`ClassifiedError`]
//!    and send exactly one terminal event.
//!
//! There is no whole-download retry: the engine retries requests and
//! fragments itself, and anything it gives up on is final.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::failure::{classify_failure, classify_missing_binary};
use super::progress::EventRelay;
use super::template::output_template;
use super::{
    ClassifiedError, DownloadError, EngineConfig, FetchEngine, OutputTarget, ProgressEvent,
    ProgressSink, Reservations, TerminalSignal,
};

/// Desktop browser user agent sent by default.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Container the audio and video tracks are merged into.
pub const DEFAULT_MERGE_FORMAT: &str = "mp4";

/// Default number of fragments fetched in parallel.
pub const DEFAULT_CONCURRENT_FRAGMENTS: u32 = 8;

/// Default engine retry count, for whole requests and for fragments.
pub const DEFAULT_RETRIES: u32 = 10;

/// One download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Resolved URL (see [`crate::resolve`]).
    pub url: String,
    /// Netscape cookie file, passed to the engine untouched.
    pub cookie_file: Option<PathBuf>,
    /// Output name override.
    pub output_name: Option<String>,
    /// Directory the output is written to.
    pub output_dir: PathBuf,
}

impl DownloadRequest {
    /// Creates a request without cookies or a custom name.
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            cookie_file: None,
            output_name: None,
            output_dir: output_dir.into(),
        }
    }

    /// Sets the cookie file.
    #[must_use]
    pub fn with_cookie_file(mut self, cookie_file: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(cookie_file.into());
        self
    }

    /// Sets the output name override.
    #[must_use]
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

/// Engine tuning applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Merge container.
    pub merge_format: String,
    /// Fragments fetched in parallel.
    pub concurrent_fragments: u32,
    /// Engine retries per request.
    pub retries: u32,
    /// Engine retries per fragment.
    pub fragment_retries: u32,
    /// User agent header.
    pub user_agent: String,
    /// Merge tool location; the engine looks it up when `None`.
    pub merge_tool_location: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            merge_format: DEFAULT_MERGE_FORMAT.to_string(),
            concurrent_fragments: DEFAULT_CONCURRENT_FRAGMENTS,
            retries: DEFAULT_RETRIES,
            fragment_retries: DEFAULT_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            merge_tool_location: None,
        }
    }
}

/// Runs download requests against an engine.
///
/// Each orchestrator owns a [`Reservations`] table; share one table between
/// orchestrators with [`Orchestrator::with_reservations`].
#[derive(Debug)]
pub struct Orchestrator<E> {
    engine: E,
    settings: OrchestratorSettings,
    reservations: Arc<Reservations>,
}

impl<E: FetchEngine> Orchestrator<E> {
    /// Creates an orchestrator with default settings and its own table.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            settings: OrchestratorSettings::default(),
            reservations: Arc::new(Reservations::new()),
        }
    }

    /// Replaces the engine settings.
    #[must_use]
    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Uses a shared reservation table.
    #[must_use]
    pub fn with_reservations(mut self, reservations: Arc<Reservations>) -> Self {
        self.reservations = reservations;
        self
    }

    /// The reservation table in use.
    #[must_use]
    pub fn reservations(&self) -> &Arc<Reservations> {
        &self.reservations
    }

    /// The engine settings in use.
    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Builds the engine configuration for `request`.
    #[must_use]
    pub fn engine_config(&self, request: &DownloadRequest) -> EngineConfig {
        EngineConfig {
            target_url: request.url.trim().to_string(),
            cookie_file: request.cookie_file.clone(),
            output_dir: request.output_dir.clone(),
            output_template: output_template(request.output_name.as_deref()),
            merge_format: self.settings.merge_format.clone(),
            concurrent_fragments: self.settings.concurrent_fragments,
            retries: self.settings.retries,
            fragment_retries: self.settings.fragment_retries,
            user_agent: self.settings.user_agent.clone(),
            merge_tool_location: self.settings.merge_tool_location.clone(),
        }
    }

    /// Runs `request` to completion, relaying progress to `sink`.
    ///
    /// Returns the output path on success. Once the engine has started, exactly
    /// one terminal event ([`ProgressEvent::Completed`] or
    /// [`ProgressEvent::Failed`]) is sent before returning. Requests refused up
    /// front ([`DownloadError::InvalidRequest`], [`DownloadError::Busy`]) send
    /// no events at all.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidRequest`] when the URL is empty
    /// - [`DownloadError::Busy`] when another run holds the same output
    /// - [`DownloadError::Classified`] when the engine fails or `cancel` fires
    #[instrument(skip(self, request, sink, cancel), fields(url = %request.url))]
    pub async fn run<S>(
        &self,
        request: &DownloadRequest,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError>
    where
        S: ProgressSink + ?Sized,
    {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(DownloadError::invalid_request("resolved URL is empty"));
        }

        let target = OutputTarget::for_request(
            &request.output_dir,
            request.output_name.as_deref(),
            url,
            &self.settings.merge_format,
        );
        let Some(_reservation) = self.reservations.try_reserve(target.clone()) else {
            warn!(output = %target, "Refusing concurrent download of the same output");
            return Err(DownloadError::busy(target.to_string()));
        };

        let config = self.engine_config(request);
        info!(
            output_dir = %config.output_dir.display(),
            template = %config.output_template,
            cookies = config.cookie_file.is_some(),
            "Starting download"
        );

        let handle = self.engine.configure(&config);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let engine_cancel = cancel.child_token();
        let mut relay = EventRelay::default();
        let mut cancel_observed = false;

        let engine = self
            .engine
            .execute(handle, events_tx, engine_cancel.clone());
        let relay_events = async {
            while let Some(event) = events_rx.recv().await {
                if cancel.is_cancelled() {
                    if !cancel_observed {
                        debug!("Cancellation observed; no further progress is relayed");
                        cancel_observed = true;
                        engine_cancel.cancel();
                    }
                    continue;
                }
                if let Some(progress) = relay.translate(event) {
                    sink.on_event(progress);
                }
            }
        };
        let (signal, ()) = tokio::join!(engine, relay_events);

        let canceled = cancel_observed || cancel.is_cancelled();
        match finish(signal, canceled, relay.last_path(), &config) {
            Ok(path) => {
                info!(path = %path.display(), "Download completed");
                sink.on_event(ProgressEvent::Completed(path.clone()));
                Ok(path)
            }
            Err(error) => {
                warn!(code = error.code(), error = %error, "Download failed");
                sink.on_event(ProgressEvent::Failed(error.clone()));
                Err(DownloadError::Classified(error))
            }
        }
    }
}

/// Maps the engine's terminal signal to the attempt's outcome.
fn finish(
    signal: TerminalSignal,
    canceled: bool,
    last_path: Option<&Path>,
    config: &EngineConfig,
) -> Result<PathBuf, ClassifiedError> {
    if canceled {
        return Err(ClassifiedError::Canceled);
    }
    match signal {
        TerminalSignal::Success { output } => Ok(output
            .or_else(|| last_path.map(Path::to_path_buf))
            .unwrap_or_else(|| config.output_dir.join(&config.output_template))),
        TerminalSignal::Failure {
            http_status,
            diagnostics,
        } => Err(classify_failure(http_status, &diagnostics)),
        TerminalSignal::MissingBinary { program } => Err(classify_missing_binary(&program)),
        TerminalSignal::Canceled => Err(ClassifiedError::Canceled),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

    use super::*;
    use crate::download::EngineEvent;

    /// Engine that replays a fixed script.
    struct ScriptedEngine {
        events: Vec<EngineEvent>,
        signal: TerminalSignal,
    }

    #[async_trait]
    impl FetchEngine for ScriptedEngine {
        type Handle = EngineConfig;

        fn configure(&self, config: &EngineConfig) -> Self::Handle {
            config.clone()
        }

        async fn execute(
            &self,
            _handle: Self::Handle,
            events: UnboundedSender<EngineEvent>,
            _cancel: CancellationToken,
        ) -> TerminalSignal {
            for event in &self.events {
                let _ = events.send(event.clone());
            }
            self.signal.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: ProgressEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl RecordingSink {
        fn take(&self) -> Vec<ProgressEvent> {
            self.events
                .lock()
                .map(|mut events| std::mem::take(&mut *events))
                .unwrap_or_default()
        }
    }

    fn request() -> DownloadRequest {
        DownloadRequest::new("https://tenant.sharepoint.com/videomanifest?part=index", "/tmp/out")
    }

    #[test]
    fn test_engine_config_carries_request_and_settings() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![],
            signal: TerminalSignal::Canceled,
        });
        let config = orchestrator.engine_config(
            &request()
                .with_cookie_file("/tmp/cookies.txt")
                .with_output_name("lecture"),
        );
        assert_eq!(config.output_template, "lecture.%(ext)s");
        assert_eq!(config.cookie_file, Some(PathBuf::from("/tmp/cookies.txt")));
        assert_eq!(config.merge_format, "mp4");
        assert_eq!(config.concurrent_fragments, 8);
        assert_eq!(config.retries, 10);
        assert_eq!(config.fragment_retries, 10);
        assert!(config.user_agent.contains("Chrome/124.0"));
    }

    #[tokio::test]
    async fn test_run_rejects_empty_url_without_events() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![],
            signal: TerminalSignal::Success { output: None },
        });
        let sink = RecordingSink::default();
        let result = orchestrator
            .run(&DownloadRequest::new("  ", "/tmp/out"), &sink, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidRequest { .. })));
        assert!(sink.take().is_empty());
    }

    #[tokio::test]
    async fn test_run_relays_in_order_and_completes_once() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![
                EngineEvent::Destination(PathBuf::from("/tmp/out/v.f1.mp4")),
                EngineEvent::Progress {
                    downloaded_bytes: 50,
                    total_bytes: None,
                    total_bytes_estimate: Some(100),
                    eta: Some(3),
                    speed: None,
                    fragment_index: None,
                    fragment_count: None,
                },
                EngineEvent::Debug("noise".to_string()),
                EngineEvent::Finished(PathBuf::from("/tmp/out/v.f1.mp4")),
            ],
            signal: TerminalSignal::Success {
                output: Some(PathBuf::from("/tmp/out/v.mp4")),
            },
        });
        let sink = RecordingSink::default();
        let result = orchestrator
            .run(&request(), &sink, &CancellationToken::new())
            .await;

        assert_eq!(result, Ok(PathBuf::from("/tmp/out/v.mp4")));
        assert_eq!(
            sink.take(),
            vec![
                ProgressEvent::Status("Saving to /tmp/out/v.f1.mp4".to_string()),
                ProgressEvent::Fraction {
                    percent: 50.0,
                    eta: Some(3)
                },
                ProgressEvent::Fraction {
                    percent: 100.0,
                    eta: Some(0)
                },
                ProgressEvent::Completed(PathBuf::from("/tmp/out/v.mp4")),
            ]
        );
        assert!(orchestrator.reservations().is_empty());
    }

    #[tokio::test]
    async fn test_run_falls_back_to_last_destination() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![EngineEvent::Destination(PathBuf::from("/tmp/out/merged.mp4"))],
            signal: TerminalSignal::Success { output: None },
        });
        let sink = RecordingSink::default();
        let result = orchestrator
            .run(&request(), &sink, &CancellationToken::new())
            .await;
        assert_eq!(result, Ok(PathBuf::from("/tmp/out/merged.mp4")));
    }

    #[tokio::test]
    async fn test_run_falls_back_to_literal_template() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![],
            signal: TerminalSignal::Success { output: None },
        });
        let sink = RecordingSink::default();
        let result = orchestrator
            .run(&request().with_output_name("talk.mp4"), &sink, &CancellationToken::new())
            .await;
        assert_eq!(result, Ok(PathBuf::from("/tmp/out/talk.mp4")));
    }

    #[tokio::test]
    async fn test_run_classifies_failure_and_sends_failed() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![EngineEvent::Error("HTTP Error 403: Forbidden".to_string())],
            signal: TerminalSignal::Failure {
                http_status: Some(403),
                diagnostics: "ERROR: HTTP Error 403: Forbidden".to_string(),
            },
        });
        let sink = RecordingSink::default();
        let result = orchestrator
            .run(&request(), &sink, &CancellationToken::new())
            .await;
        assert_eq!(
            result,
            Err(DownloadError::Classified(ClassifiedError::Forbidden))
        );
        let events = sink.take();
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Failed(ClassifiedError::Forbidden))
        );
    }

    #[tokio::test]
    async fn test_run_missing_merge_tool() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![],
            signal: TerminalSignal::MissingBinary {
                program: "ffmpeg".to_string(),
            },
        });
        let result = orchestrator
            .run(&request(), &RecordingSink::default(), &CancellationToken::new())
            .await;
        assert_eq!(
            result,
            Err(DownloadError::Classified(ClassifiedError::MergeToolMissing))
        );
    }

    #[tokio::test]
    async fn test_run_precanceled_never_completes() {
        let orchestrator = Orchestrator::new(ScriptedEngine {
            events: vec![EngineEvent::Finished(PathBuf::from("/tmp/out/v.mp4"))],
            signal: TerminalSignal::Success {
                output: Some(PathBuf::from("/tmp/out/v.mp4")),
            },
        });
        let sink = RecordingSink::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = orchestrator.run(&request(), &sink, &cancel).await;
        assert_eq!(
            result,
            Err(DownloadError::Classified(ClassifiedError::Canceled))
        );
        assert_eq!(
            sink.take(),
            vec![ProgressEvent::Failed(ClassifiedError::Canceled)]
        );
    }
}
