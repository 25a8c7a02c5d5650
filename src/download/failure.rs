//! Deterministic failure classification from engine diagnostics.
//!
//! Rules are checked in a fixed order and the first match wins:
//! authentication, forbidden, DRM, missing merge tool, transport, and finally
//! [`ClassifiedError::Unrecognized`] carrying the most relevant diagnostic line.
//!
//! `WARNING:` lines describe problems the engine recovered from (retried
//! fragments, fallbacks), so only transport evidence is taken from them.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::ClassifiedError;

#[allow(clippy::expect_used)]
static AUTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)unauthorized|login required|sign in")
        .expect("auth pattern is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static FORBIDDEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bforbidden\b").expect("forbidden pattern is valid")
});

#[allow(clippy::expect_used)]
static DRM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdrm\b|widevine|playready").expect("drm pattern is valid")
});

#[allow(clippy::expect_used)]
static MERGE_TOOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ffmpeg|ffprobe").expect("merge tool pattern is valid"));

#[allow(clippy::expect_used)]
static MISSING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)not installed|not found").expect("missing pattern is valid")
});

#[allow(clippy::expect_used)]
static TRANSPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)timed out|timeout|connection reset|connection refused|temporary failure in name resolution|network is unreachable|broken pipe|incompleteread",
    )
    .expect("transport pattern is valid")
});

#[allow(clippy::expect_used)]
static HTTP_STATUS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)HTTP Error (\d{3})\b|status code:? (\d{3})\b")
        .expect("HTTP status pattern is valid")
});

/// Programs whose absence means the merge step cannot run.
const MERGE_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Classifies a failed engine run.
///
/// `http_status` is the status the engine reported, if any; `diagnostics` is
/// the engine's collected error output.
///
/// # Examples
///
/// ```
/// use spdl_core::{ClassifiedError, classify_failure};
///
/// let error = classify_failure(None, "ERROR: This video is DRM protected");
/// assert_eq!(error, ClassifiedError::DrmProtected);
/// ```
#[must_use]
pub fn classify_failure(http_status: Option<u16>, diagnostics: &str) -> ClassifiedError {
    let relevant = without_warnings(diagnostics);
    let status = http_status.or_else(|| last_http_status(&relevant));
    // A concrete non-access status outranks loose wording elsewhere in the output.
    let access_text = matches!(status, None | Some(401 | 403));

    if status == Some(401) || (access_text && AUTH_PATTERN.is_match(&relevant)) {
        return ClassifiedError::AuthRequired;
    }
    if status == Some(403) || (access_text && FORBIDDEN_PATTERN.is_match(&relevant)) {
        return ClassifiedError::Forbidden;
    }
    if DRM_PATTERN.is_match(&relevant) {
        return ClassifiedError::DrmProtected;
    }
    if MERGE_TOOL_PATTERN.is_match(&relevant) && MISSING_PATTERN.is_match(&relevant) {
        return ClassifiedError::MergeToolMissing;
    }
    if TRANSPORT_PATTERN.is_match(&relevant)
        || (status.is_none() && TRANSPORT_PATTERN.is_match(diagnostics))
    {
        return ClassifiedError::NetworkTransient;
    }
    ClassifiedError::Unrecognized(unrecognized_message(http_status, diagnostics))
}

/// Classifies a run that could not start because `program` is missing.
#[must_use]
pub(crate) fn classify_missing_binary(program: &str) -> ClassifiedError {
    let stem = Path::new(program)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(program)
        .to_ascii_lowercase();
    if MERGE_TOOLS.contains(&stem.as_str()) {
        ClassifiedError::MergeToolMissing
    } else {
        ClassifiedError::Unrecognized(format!(
            "required program `{program}` was not found; install it or pass its path with --yt-dlp"
        ))
    }
}

/// Extracts the status code from an `HTTP Error NNN` or `status code NNN` line.
#[must_use]
pub(crate) fn extract_http_status(line: &str) -> Option<u16> {
    HTTP_STATUS_PATTERN.captures(line).and_then(|c| status_of(&c))
}

fn last_http_status(text: &str) -> Option<u16> {
    HTTP_STATUS_PATTERN
        .captures_iter(text)
        .filter_map(|c| status_of(&c))
        .last()
}

fn status_of(captures: &regex::Captures<'_>) -> Option<u16> {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|code| code.as_str().parse().ok())
}

fn without_warnings(diagnostics: &str) -> String {
    diagnostics
        .lines()
        .filter(|line| !line.trim_start().starts_with("WARNING:"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Picks the line to surface: the last `ERROR:` line, else the last non-empty one.
fn unrecognized_message(http_status: Option<u16>, diagnostics: &str) -> String {
    let lines = || diagnostics.lines().map(str::trim).filter(|l| !l.is_empty());
    if let Some(line) = lines().rev().find(|l| l.starts_with("ERROR:")) {
        return line.to_string();
    }
    if let Some(line) = lines().next_back() {
        return line.to_string();
    }
    match http_status {
        Some(status) => format!("engine failed with HTTP {status}"),
        None => "engine failed without diagnostics".to_string(),
    }
}
