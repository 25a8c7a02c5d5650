//! Download orchestration over an external fetch/merge engine.
//!
//! This module never talks HTTP itself. It hands a resolved manifest URL to a
//! [`FetchEngine`] (normally [`YtDlpEngine`]), relays the engine's progress to
//! a [`ProgressSink`], and turns the engine's terminal signal into a path or a
//! [`ClassifiedError`].
//!
//! # Example
//!
//! ```no_run
//! use spdl_core::{DownloadRequest, Orchestrator, ProgressEvent, YtDlpEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(YtDlpEngine::new());
//! let request = DownloadRequest::new(
//!     "https://tenant.sharepoint.com/_api/v2.1/videomanifest.ashx?provider=spo&docid=A&part=index&format=dash",
//!     "./downloads",
//! )
//! .with_cookie_file("cookies.txt");
//! let sink = |event: ProgressEvent| println!("{event:?}");
//! let path = orchestrator.run(&request, &sink, &CancellationToken::new()).await?;
//! println!("Saved: {}", path.display());
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod failure;
mod orchestrator;
mod progress;
mod reservation;
mod template;
mod ytdlp;

pub use engine::{EngineConfig, EngineEvent, FetchEngine, TerminalSignal};
pub use error::{ClassifiedError, DownloadError};
pub use failure::classify_failure;
pub use orchestrator::{
    DEFAULT_CONCURRENT_FRAGMENTS, DEFAULT_MERGE_FORMAT, DEFAULT_RETRIES, DEFAULT_USER_AGENT,
    DownloadRequest, Orchestrator, OrchestratorSettings,
};
pub use progress::{ProgressEvent, ProgressSink};
pub use reservation::{OutputTarget, ReservationGuard, Reservations};
pub use template::{DEFAULT_OUTPUT_TEMPLATE, output_template};
pub use ytdlp::{YT_DLP_PROGRAM, YtDlpEngine, YtDlpInvocation};
