//! [`FetchEngine`] backed by the `yt-dlp` executable.
//!
//! `yt-dlp` fetches the DASH fragments and calls `ffmpeg` to merge the audio
//! and video tracks. The adapter turns an [`EngineConfig`] into a command line,
//! reads the child's stdout and stderr line by line, and maps what it sees
//! onto [`EngineEvent`]s. Two marker prefixes make stdout machine-readable:
//!
//! - `[spdl-progress]` lines come from `--progress-template`
//! - the `[spdl-final]` line comes from `--print after_move:` and carries the
//!   final output path

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::failure::extract_http_status;
use super::{EngineConfig, EngineEvent, FetchEngine, TerminalSignal};

/// Default executable name looked up on `PATH`.
pub const YT_DLP_PROGRAM: &str = "yt-dlp";

/// Merge tool looked up on `PATH` when the config names none.
const MERGE_TOOL_PROGRAM: &str = "ffmpeg";

const PROGRESS_MARKER: &str = "[spdl-progress]";
const FINAL_MARKER: &str = "[spdl-final]";

/// Stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 200;

/// Fields of the progress template, in order. The file name comes last
/// because it may contain spaces.
const PROGRESS_TEMPLATE: &str = "download:[spdl-progress] %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.eta)s %(progress.speed)s %(progress.fragment_index)s %(progress.fragment_count)s %(progress.filename)s";

/// Runs downloads through a `yt-dlp` child process.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpEngine {
    /// Uses `yt-dlp` from `PATH`.
    ///
    /// When it is not installed the bare name is kept, so the run reports
    /// [`TerminalSignal::MissingBinary`].
    #[must_use]
    pub fn new() -> Self {
        let program = which::which(YT_DLP_PROGRAM).unwrap_or_else(|error| {
            debug!(error = %error, "yt-dlp not found on PATH");
            PathBuf::from(YT_DLP_PROGRAM)
        });
        Self { program }
    }

    /// Uses an explicit `yt-dlp` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable that will be started.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Prepared `yt-dlp` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpInvocation {
    program: PathBuf,
    args: Vec<String>,
}

impl YtDlpInvocation {
    /// Executable to start.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments, target URL last.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    type Handle = YtDlpInvocation;

    fn configure(&self, config: &EngineConfig) -> Self::Handle {
        let merge_tool = config.merge_tool_location.clone().or_else(|| {
            which::which(MERGE_TOOL_PROGRAM)
                .map_err(|error| debug!(error = %error, "ffmpeg not found on PATH"))
                .ok()
        });
        YtDlpInvocation {
            program: self.program.clone(),
            args: build_args(config, merge_tool.as_deref()),
        }
    }

    async fn execute(
        &self,
        handle: Self::Handle,
        events: UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> TerminalSignal {
        let program = handle.program.display().to_string();
        debug!(program = %program, args = ?handle.args, "Spawning yt-dlp");

        let spawned = Command::new(&handle.program)
            .args(&handle.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn!(program = %program, "yt-dlp executable not found");
                return TerminalSignal::MissingBinary { program };
            }
            Err(error) => {
                return TerminalSignal::Failure {
                    http_status: None,
                    diagnostics: format!("failed to start {program}: {error}"),
                };
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill().await;
            return TerminalSignal::Failure {
                http_status: None,
                diagnostics: "yt-dlp output pipes unavailable".to_string(),
            };
        };

        let stdout_task = tokio::spawn(read_stdout(stdout, events.clone()));
        let stderr_task = tokio::spawn(read_stderr(stderr, events));

        let status = tokio::select! {
            status = child.wait() => status,
            () = cancel.cancelled() => {
                info!("Stopping yt-dlp after cancellation");
                if let Err(error) = child.kill().await {
                    warn!(error = %error, "Failed to kill yt-dlp");
                }
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                return TerminalSignal::Canceled;
            }
        };

        let final_path = stdout_task.await.unwrap_or_default();
        let StderrSummary { tail, http_status } = stderr_task.await.unwrap_or_default();

        match status {
            Ok(status) if status.success() => TerminalSignal::Success { output: final_path },
            Ok(status) => {
                debug!(code = ?status.code(), "yt-dlp exited unsuccessfully");
                TerminalSignal::Failure {
                    http_status,
                    diagnostics: Vec::from(tail).join("\n"),
                }
            }
            Err(error) => TerminalSignal::Failure {
                http_status,
                diagnostics: format!("failed to wait for {program}: {error}"),
            },
        }
    }
}

/// Builds the `yt-dlp` argument list; the target URL is last.
pub(crate) fn build_args(config: &EngineConfig, merge_tool: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "--newline".to_string(),
        "--progress".to_string(),
        "--no-simulate".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "--print".to_string(),
        format!("after_move:{FINAL_MARKER}%(filepath)s"),
        "--merge-output-format".to_string(),
        config.merge_format.clone(),
        "-N".to_string(),
        config.concurrent_fragments.to_string(),
        "--retries".to_string(),
        config.retries.to_string(),
        "--fragment-retries".to_string(),
        config.fragment_retries.to_string(),
        "--user-agent".to_string(),
        config.user_agent.clone(),
        "-P".to_string(),
        config.output_dir.display().to_string(),
        "-o".to_string(),
        config.output_template.clone(),
    ];
    if let Some(cookies) = &config.cookie_file {
        args.push("--cookies".to_string());
        args.push(cookies.display().to_string());
    }
    if let Some(location) = merge_tool {
        args.push("--ffmpeg-location".to_string());
        args.push(location.display().to_string());
    }
    args.push("--".to_string());
    args.push(config.target_url.clone());
    args
}

/// Reads stdout, relaying events; returns the final path if reported.
async fn read_stdout<R>(stdout: R, events: UnboundedSender<EngineEvent>) -> Option<PathBuf>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();
    let mut final_path = None;
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_stdout_line(&line) {
            StdoutLine::Final(path) => final_path = Some(path),
            StdoutLine::Event(event) => {
                let _ = events.send(event);
            }
        }
    }
    final_path
}

#[derive(Debug, Default)]
struct StderrSummary {
    tail: VecDeque<String>,
    http_status: Option<u16>,
}

/// Reads stderr, relaying warnings and errors and keeping a bounded tail.
async fn read_stderr<R>(stderr: R, events: UnboundedSender<EngineEvent>) -> StderrSummary
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    let mut summary = StderrSummary::default();
    while let Ok(Some(line)) = lines.next_line().await {
        // Retry warnings quote statuses the engine recovered from.
        if line.trim_start().starts_with("ERROR:")
            && let Some(status) = extract_http_status(&line)
        {
            summary.http_status = Some(status);
        }
        let _ = events.send(parse_stderr_line(&line));
        summary.tail.push_back(line);
        if summary.tail.len() > STDERR_TAIL_LINES {
            summary.tail.pop_front();
        }
    }
    summary
}

#[derive(Debug, PartialEq)]
enum StdoutLine {
    Final(PathBuf),
    Event(EngineEvent),
}

fn parse_stdout_line(line: &str) -> StdoutLine {
    let trimmed = line.trim();
    if let Some(path) = trimmed.strip_prefix(FINAL_MARKER) {
        return StdoutLine::Final(PathBuf::from(path.trim()));
    }
    if let Some(event) = parse_progress_line(trimmed) {
        return StdoutLine::Event(event);
    }
    if let Some(path) = parse_destination_line(trimmed) {
        return StdoutLine::Event(EngineEvent::Destination(path));
    }
    trace!(line = %trimmed, "yt-dlp stdout");
    StdoutLine::Event(EngineEvent::Debug(trimmed.to_string()))
}

fn parse_stderr_line(line: &str) -> EngineEvent {
    let trimmed = line.trim();
    if let Some(text) = trimmed.strip_prefix("WARNING:") {
        EngineEvent::Warning(text.trim().to_string())
    } else if let Some(text) = trimmed.strip_prefix("ERROR:") {
        EngineEvent::Error(text.trim().to_string())
    } else {
        EngineEvent::Debug(trimmed.to_string())
    }
}

/// Parses a `[spdl-progress]` line produced by [`PROGRESS_TEMPLATE`].
fn parse_progress_line(line: &str) -> Option<EngineEvent> {
    let rest = line.strip_prefix(PROGRESS_MARKER)?.trim_start();
    let fields: Vec<&str> = rest.splitn(9, ' ').collect();
    let [status, downloaded, total, estimate, eta, speed, index, count, filename] =
        fields.as_slice()
    else {
        return None;
    };

    if *status == "finished" {
        return Some(EngineEvent::Finished(PathBuf::from(filename.trim())));
    }
    Some(EngineEvent::Progress {
        downloaded_bytes: parse_bytes(downloaded).unwrap_or(0),
        total_bytes: parse_bytes(total),
        total_bytes_estimate: parse_bytes(estimate),
        eta: parse_bytes(eta),
        speed: parse_number(speed),
        fragment_index: parse_bytes(index).and_then(|v| u32::try_from(v).ok()),
        fragment_count: parse_bytes(count).and_then(|v| u32::try_from(v).ok()),
    })
}

/// Parses `[download] Destination:` and `[Merger]` lines.
fn parse_destination_line(line: &str) -> Option<PathBuf> {
    if let Some(rest) = line.strip_prefix("[download] Destination:") {
        let path = rest.trim();
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        let path = rest.trim_end_matches('"');
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Template fields render missing values as `NA` (or `None` on older builds).
fn parse_number(field: &str) -> Option<f64> {
    match field.trim() {
        "" | "NA" | "None" => None,
        value => value.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_bytes(field: &str) -> Option<u64> {
    parse_number(field).map(|value| value.round() as u64)
}
