//! Exit code logic for the download process.
//!
//! Single responsibility: map the download outcome to the process exit code.

use std::path::PathBuf;

use spdl_core::{ClassifiedError, DownloadError};

use crate::ProcessExit;

/// Maps a download error to its exit code.
pub(crate) fn exit_for_error(error: &DownloadError) -> ProcessExit {
    match error {
        DownloadError::Busy { .. } => ProcessExit::Busy,
        DownloadError::InvalidRequest { .. } => ProcessExit::Usage,
        DownloadError::Classified(classified) => exit_for_classified(classified),
    }
}

fn exit_for_classified(error: &ClassifiedError) -> ProcessExit {
    match error {
        ClassifiedError::AuthRequired => ProcessExit::AuthRequired,
        ClassifiedError::Forbidden => ProcessExit::Forbidden,
        ClassifiedError::DrmProtected => ProcessExit::DrmProtected,
        ClassifiedError::MergeToolMissing => ProcessExit::MergeToolMissing,
        ClassifiedError::NetworkTransient => ProcessExit::NetworkTransient,
        ClassifiedError::Canceled => ProcessExit::Canceled,
        ClassifiedError::Unrecognized(_) => ProcessExit::Unrecognized,
    }
}

/// Determines the process exit outcome from a finished download.
pub(crate) fn determine_exit_outcome(outcome: &Result<PathBuf, DownloadError>) -> ProcessExit {
    match outcome {
        Ok(_) => ProcessExit::Success,
        Err(error) => exit_for_error(error),
    }
}
