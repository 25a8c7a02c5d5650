//! The boundary between the orchestrator and a fetch/merge engine.
//!
//! An engine is configured once per request with an [`EngineConfig`], then
//! executed. While running it reports [`EngineEvent`]s over an unbounded
//! channel and finally returns one [`TerminalSignal`]. The orchestrator is
//! generic over [`FetchEngine`], so tests drive it with a simulated engine.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Everything an engine needs to fetch and merge one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Manifest (or pass-through) URL to fetch.
    pub target_url: String,
    /// Netscape cookie file, passed through untouched.
    pub cookie_file: Option<PathBuf>,
    /// Directory the output lands in.
    pub output_dir: PathBuf,
    /// Engine output template relative to `output_dir`.
    pub output_template: String,
    /// Container the merged tracks are written to.
    pub merge_format: String,
    /// Fragments fetched in parallel.
    pub concurrent_fragments: u32,
    /// Retries for whole-request failures inside the engine.
    pub retries: u32,
    /// Retries per fragment inside the engine.
    pub fragment_retries: u32,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Merge tool (ffmpeg) binary or directory, when known.
    pub merge_tool_location: Option<PathBuf>,
}

/// Low-level notifications emitted while an engine runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Byte progress of the current track.
    Progress {
        /// Bytes written so far.
        downloaded_bytes: u64,
        /// Exact size, when the server reported it.
        total_bytes: Option<u64>,
        /// Estimated size, for fragmented downloads.
        total_bytes_estimate: Option<u64>,
        /// Estimated seconds remaining.
        eta: Option<u64>,
        /// Bytes per second.
        speed: Option<f64>,
        /// Index of the fragment being fetched.
        fragment_index: Option<u32>,
        /// Total fragments of the track.
        fragment_count: Option<u32>,
    },
    /// The engine picked a file to write.
    Destination(PathBuf),
    /// A track (or the merged output) was written.
    Finished(PathBuf),
    /// Non-fatal engine warning.
    Warning(String),
    /// Error text reported before the engine gave up.
    Error(String),
    /// Diagnostic chatter.
    Debug(String),
}

/// How an engine run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalSignal {
    /// The output was written; `output` is its final path when known.
    Success {
        /// Final output path reported by the engine.
        output: Option<PathBuf>,
    },
    /// The engine gave up.
    Failure {
        /// HTTP status seen in the diagnostics, if any.
        http_status: Option<u16>,
        /// Collected error output.
        diagnostics: String,
    },
    /// A required executable could not be started.
    MissingBinary {
        /// Name or path of the missing program.
        program: String,
    },
    /// The run stopped because cancellation was requested.
    Canceled,
}

/// A fragment fetching and merging engine.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Prepared, request-specific invocation.
    type Handle: Send + 'static;

    /// Prepares an invocation for `config`. Performs no I/O.
    fn configure(&self, config: &EngineConfig) -> Self::Handle;

    /// Runs the prepared invocation to completion.
    ///
    /// Events go to `events` in the order they happen; the sender is dropped
    /// when this returns. Implementations must stop promptly and return
    /// [`TerminalSignal::Canceled`] once `cancel` fires.
    async fn execute(
        &self,
        handle: Self::Handle,
        events: UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> TerminalSignal;
}
