//! Argument mode: request from flags, progress on an indicatif bar.

use std::path::Path;

use anyhow::{Result, bail};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use spdl_core::{DownloadRequest, ProgressEvent, ProgressSink};

use crate::app::config::RunSettings;
use crate::cli::Args;

/// Builds the download request from command-line flags.
pub(crate) fn build_request(args: &Args, settings: &RunSettings) -> Result<DownloadRequest> {
    let Some(url) = args.url.as_deref().map(str::trim).filter(|url| !url.is_empty()) else {
        bail!("no video URL given; pass one as an argument or use --interactive");
    };

    let mut request = DownloadRequest::new(url, settings.output_dir.clone());
    if let Some(cookies) = args.cookies.as_deref() {
        ensure_cookie_file(cookies)?;
        request = request.with_cookie_file(cookies);
    }
    if let Some(name) = args.name.as_deref() {
        request = request.with_output_name(name);
    }
    Ok(request)
}

fn ensure_cookie_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("cookies file not found: {}", path.display());
    }
    Ok(())
}

/// Formats an ETA in seconds as `1h 2m 3s`, `2m 3s` or `3s`.
pub(crate) fn format_eta(seconds: u64) -> String {
    let (minutes, secs) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Progress sink backed by an indicatif bar on stderr.
pub(crate) struct IndicatifSink {
    bar: ProgressBar,
    quiet: bool,
}

impl IndicatifSink {
    /// Creates the sink; the bar is hidden unless `visible`.
    pub(crate) fn new(visible: bool, quiet: bool) -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), draw_target(visible));
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar, quiet }
    }

    fn status(&self, text: &str) {
        if self.bar.is_hidden() {
            if !self.quiet {
                eprintln!("{text}");
            }
        } else {
            self.bar.println(text);
        }
    }
}

fn draw_target(visible: bool) -> ProgressDrawTarget {
    if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}

impl ProgressSink for IndicatifSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Fraction { percent, eta } => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let position = percent.clamp(0.0, 100.0).round() as u64;
                self.bar.set_position(position);
                let message = eta
                    .map(|eta| format!("ETA {}", format_eta(eta)))
                    .unwrap_or_default();
                self.bar.set_message(message);
            }
            ProgressEvent::Status(text) => self.status(&text),
            ProgressEvent::Completed(_) => self.bar.finish_and_clear(),
            ProgressEvent::Failed(_) => self.bar.abandon(),
        }
    }
}
