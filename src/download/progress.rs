//! Progress events delivered to front ends, and the engine-event relay.

use std::path::{Path, PathBuf};

use tracing::trace;

use super::{ClassifiedError, EngineEvent};

/// Normalized progress notification.
///
/// A stream of events for one attempt ends with exactly one terminal event,
/// [`ProgressEvent::Completed`] or [`ProgressEvent::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Share of the current track written, `0.0..=100.0`.
    ///
    /// Non-decreasing within an attempt except when a fragment retry restarts
    /// a track.
    Fraction {
        /// Percent complete.
        percent: f64,
        /// Estimated seconds remaining.
        eta: Option<u64>,
    },
    /// Human-readable status line.
    Status(String),
    /// The download finished; the output is at this path.
    Completed(PathBuf),
    /// The download ended in a classified failure.
    Failed(ClassifiedError),
}

impl ProgressEvent {
    /// Whether this event closes the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Receiver of progress events, implemented by front ends.
///
/// Called from the orchestrator's task, in order, one call per event.
pub trait ProgressSink: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: ProgressEvent) {
        self(event);
    }
}

/// Maps engine events onto progress events and remembers the output path.
#[derive(Debug, Default)]
pub(crate) struct EventRelay {
    last_path: Option<PathBuf>,
}

impl EventRelay {
    /// Translates one engine event; `None` when it is not relayed.
    pub(crate) fn translate(&mut self, event: EngineEvent) -> Option<ProgressEvent> {
        match event {
            EngineEvent::Progress {
                downloaded_bytes,
                total_bytes,
                total_bytes_estimate,
                eta,
                ..
            } => Some(ProgressEvent::Fraction {
                percent: percent_complete(downloaded_bytes, total_bytes.or(total_bytes_estimate)),
                eta,
            }),
            EngineEvent::Finished(path) => {
                self.last_path = Some(path);
                Some(ProgressEvent::Fraction {
                    percent: 100.0,
                    eta: Some(0),
                })
            }
            EngineEvent::Destination(path) => {
                let status = format!("Saving to {}", path.display());
                self.last_path = Some(path);
                Some(ProgressEvent::Status(status))
            }
            EngineEvent::Warning(text) => Some(ProgressEvent::Status(format!("[WARN] {text}"))),
            EngineEvent::Error(text) => Some(ProgressEvent::Status(format!("[ERROR] {text}"))),
            EngineEvent::Debug(text) => {
                trace!(line = %text, "Engine diagnostic");
                None
            }
        }
    }

    /// Last destination or finished path seen.
    pub(crate) fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }
}

/// Percent of `total` written, clamped to `0.0..=100.0`; zero when unknown.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn percent_complete(downloaded: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}
