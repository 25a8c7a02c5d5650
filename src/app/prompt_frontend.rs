//! Prompt mode: asks for the request on the terminal and draws a text bar.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use spdl_core::{DownloadRequest, ProgressEvent, ProgressSink};

use crate::app::config::RunSettings;

const BAR_CELLS: usize = 20;

/// Asks for URL, cookies and output name, then builds the request.
pub(crate) fn prompt_request<R, W>(
    input: &mut R,
    output: &mut W,
    settings: &RunSettings,
) -> Result<DownloadRequest>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "=== SharePoint / Stream downloader (yt-dlp) ===")?;

    let url = loop {
        let Some(answer) = ask(input, output, "Video URL: ")? else {
            bail!("input closed before a video URL was entered");
        };
        let url = strip_quotes(&answer);
        if !url.is_empty() {
            break url.to_string();
        }
    };

    let mut request = DownloadRequest::new(url, settings.output_dir.clone());

    let use_cookies = ask(input, output, "Use cookies file? [y/N]: ")?
        .is_some_and(|answer| answer.trim().eq_ignore_ascii_case("y"));
    if use_cookies && let Some(cookies) = ask_cookie_file(input, output)? {
        request = request.with_cookie_file(cookies);
    }

    let name = ask(
        input,
        output,
        "Custom output name (optional, no extension to auto-pick): ",
    )?;
    if let Some(name) = name.as_deref().map(str::trim).filter(|name| !name.is_empty()) {
        request = request.with_output_name(name);
    }

    Ok(request)
}

/// Re-asks until the path names an existing file; blank skips cookies.
fn ask_cookie_file<R, W>(input: &mut R, output: &mut W) -> Result<Option<PathBuf>>
where
    R: BufRead,
    W: Write,
{
    loop {
        let Some(answer) = ask(
            input,
            output,
            "Enter path to cookies file (or leave blank to skip): ",
        )?
        else {
            return Ok(None);
        };
        let path = strip_quotes(&answer);
        if path.is_empty() {
            return Ok(None);
        }
        let path = PathBuf::from(path);
        if path.is_file() {
            writeln!(output, "[INFO] Selected cookies file: {}", path.display())?;
            return Ok(Some(path));
        }
        writeln!(output, "[WARN] cookies file not found: {}", path.display())?;
    }
}

/// Prints `question` and reads one line; `None` on end of input.
fn ask<R, W>(input: &mut R, output: &mut W, question: &str) -> Result<Option<String>>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    let read = input.read_line(&mut line).context("failed to read answer")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn strip_quotes(answer: &str) -> &str {
    answer.trim().trim_matches('"').trim_matches('\'').trim()
}

/// Renders `[####----------------]  42.0%`.
pub(crate) fn render_bar(percent: f64) -> String {
    let percent = percent.clamp(0.0, 100.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((percent / 5.0) as usize).min(BAR_CELLS);
    format!(
        "[{}{}] {percent:5.1}%",
        "#".repeat(filled),
        "-".repeat(BAR_CELLS - filled)
    )
}

struct TextBarState<W> {
    out: W,
    mid_line: bool,
}

/// Progress sink that redraws a text bar in place.
pub(crate) struct TextBarSink<W> {
    state: Mutex<TextBarState<W>>,
}

impl<W: Write> TextBarSink<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            state: Mutex::new(TextBarState {
                out,
                mid_line: false,
            }),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }
}

impl<W> TextBarState<W>
where
    W: Write,
{
    fn end_line(&mut self) {
        if self.mid_line {
            let _ = writeln!(self.out);
            self.mid_line = false;
        }
    }

    fn line(&mut self, text: &str) {
        self.end_line();
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W> ProgressSink for TextBarSink<W>
where
    W: Write + Send,
{
    fn on_event(&self, event: ProgressEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            ProgressEvent::Fraction { percent, .. } => {
                let _ = write!(state.out, "\r{}", render_bar(percent));
                state.mid_line = true;
                if percent >= 100.0 {
                    state.end_line();
                }
            }
            ProgressEvent::Status(text) => state.line(&text),
            ProgressEvent::Completed(_) => state.line("[OK] Finished."),
            ProgressEvent::Failed(_) => state.end_line(),
        }
        let _ = state.out.flush();
    }
}
