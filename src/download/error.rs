//! Error types for the download module.
//!
//! [`ClassifiedError`] is the closed failure taxonomy a download can end in.
//! [`DownloadError`] is what [`Orchestrator::run`](super::Orchestrator::run)
//! returns: either a classified failure or a request that was refused before
//! any engine work started.

use thiserror::Error;

/// Terminal failure of a download attempt.
///
/// Built once where the failure is observed and surfaced unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifiedError {
    /// The server wants a logged-in session (HTTP 401 or a login redirect).
    #[error("[AUTH] authentication required: the server rejected the session")]
    AuthRequired,

    /// The session is valid but not allowed to read this video (HTTP 403).
    #[error("[AUTH] access forbidden (HTTP 403)")]
    Forbidden,

    /// The stream is DRM-protected.
    #[error("[DRM] video is DRM-protected and cannot be downloaded")]
    DrmProtected,

    /// Audio and video tracks were fetched but no merge tool is installed.
    #[error("merge tool missing: ffmpeg is required to merge audio and video tracks")]
    MergeToolMissing,

    /// Connection-level failure that may succeed on a later attempt.
    #[error("network error: the connection failed or timed out")]
    NetworkTransient,

    /// The caller canceled the download.
    #[error("download canceled")]
    Canceled,

    /// Anything else; carries the engine's diagnostic verbatim.
    #[error("download failed: {0}")]
    Unrecognized(String),
}

impl ClassifiedError {
    /// Actionable guidance for the user, when there is any.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthRequired => Some(
                "Export fresh cookies (Netscape cookies.txt) from a browser session that is signed in to SharePoint and pass them with --cookies.",
            ),
            Self::Forbidden => Some(
                "Your account may not have access to this video, or the cookies belong to another account. Re-export cookies or ask the owner to share the video.",
            ),
            Self::DrmProtected => Some(
                "This video is protected by DRM; it cannot be saved. Watch it in the browser instead.",
            ),
            Self::MergeToolMissing => Some("Install ffmpeg and make sure it is on PATH."),
            Self::NetworkTransient => {
                Some("Check network connectivity/VPN access, then run the download again.")
            }
            Self::Unrecognized(_) => Some("Re-run with -v to see the engine's diagnostics."),
            Self::Canceled => None,
        }
    }

    /// Stable machine-readable label.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::Forbidden => "forbidden",
            Self::DrmProtected => "drm_protected",
            Self::MergeToolMissing => "merge_tool_missing",
            Self::NetworkTransient => "network_transient",
            Self::Canceled => "canceled",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Errors returned by [`Orchestrator::run`](super::Orchestrator::run).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Another download already writes to the same output.
    #[error("{target} is already being downloaded")]
    Busy {
        /// Display form of the contested output target.
        target: String,
    },

    /// The request cannot be attempted at all.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request.
        reason: String,
    },

    /// The attempt ran and ended in a classified failure.
    #[error(transparent)]
    Classified(#[from] ClassifiedError),
}

impl DownloadError {
    /// Creates a busy error for the given target.
    pub fn busy(target: impl Into<String>) -> Self {
        Self::Busy {
            target: target.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns the classified failure, if the attempt ran.
    #[must_use]
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Classified(error) => Some(error),
            Self::Busy { .. } | Self::InvalidRequest { .. } => None,
        }
    }

    /// Actionable guidance for the user, when there is any.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Busy { .. } => {
                Some("Wait for the running download to finish or choose a different --name.")
            }
            Self::InvalidRequest { .. } => None,
            Self::Classified(error) => error.hint(),
        }
    }
}
