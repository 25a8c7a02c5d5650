//! Run wiring: config, front end, resolution, download and exit code.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use spdl_core::{
    ClassifiedError, DownloadError, DownloadRequest, Orchestrator, ProgressSink, Resolution,
    YtDlpEngine, resolve,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ProcessExit;
use crate::app::config::{self, RunSettings};
use crate::app::prompt_frontend::TextBarSink;
use crate::app::{args_frontend, exit_handler, prompt_frontend, terminal};
use crate::cli::Args;

/// Prompt mode is explicit, or implied by a missing URL on an interactive stdin.
pub(crate) fn use_prompt_mode(interactive: bool, has_url: bool, stdin_is_terminal: bool) -> bool {
    interactive || (!has_url && stdin_is_terminal)
}

pub(crate) async fn run_spdl() -> Result<ProcessExit> {
    let args = Args::parse();
    let loaded = config::load_config(args.config.as_deref())?;

    let default_level = terminal::default_log_level(args.verbose, args.quiet);
    let no_color = terminal::is_no_color_requested(&args);
    terminal::init_tracing(default_level, no_color);

    debug!(?args, "CLI arguments parsed");
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "Loaded config file");
    }
    let settings = config::resolve_settings(&args, &loaded.config);

    let prompt_mode =
        use_prompt_mode(args.interactive, args.url.is_some(), io::stdin().is_terminal());
    let built = if prompt_mode {
        let mut input = io::stdin().lock();
        let mut output = io::stdout();
        prompt_frontend::prompt_request(&mut input, &mut output, &settings)
    } else {
        args_frontend::build_request(&args, &settings)
    };
    let mut request = match built {
        Ok(request) => request,
        Err(error) => {
            eprintln!("Error: {error:#}");
            return Ok(ProcessExit::Usage);
        }
    };

    let resolution = resolve(&request.url, &settings.profile);
    report_resolution(&resolution, args.quiet);
    request.url = resolution.url;

    let sink: Box<dyn ProgressSink> = if prompt_mode {
        Box::new(TextBarSink::new(io::stdout()))
    } else {
        let visible = terminal::should_show_progress_bar(
            io::stderr().is_terminal(),
            args.quiet,
            terminal::is_dumb_terminal(),
        );
        Box::new(args_frontend::IndicatifSink::new(visible, args.quiet))
    };

    let outcome = download(&request, &settings, sink.as_ref()).await;
    report_outcome(&outcome);
    Ok(exit_handler::determine_exit_outcome(&outcome))
}

async fn download(
    request: &DownloadRequest,
    settings: &RunSettings,
    sink: &dyn ProgressSink,
) -> Result<PathBuf, DownloadError> {
    let engine = settings
        .yt_dlp
        .clone()
        .map_or_else(YtDlpEngine::new, YtDlpEngine::with_program);
    info!(engine = %engine.program().display(), "Downloader starting");
    let orchestrator = Orchestrator::new(engine).with_settings(settings.orchestrator.clone());

    let cancel = CancellationToken::new();
    let interrupted = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted.cancel();
        }
    });

    orchestrator.run(request, sink, &cancel).await
}

fn report_resolution(resolution: &Resolution, quiet: bool) {
    info!(shape = %resolution.shape, changed = resolution.changed, "Resolved video URL");
    if quiet {
        return;
    }
    eprintln!("[INFO] {}", resolution.note);
    if resolution.changed {
        eprintln!("Using manifest: {}", resolution.url);
    }
}

fn report_outcome(outcome: &Result<PathBuf, DownloadError>) {
    match outcome {
        Ok(path) => println!("Saved: {}", path.display()),
        Err(DownloadError::Classified(ClassifiedError::Canceled)) => {
            eprintln!("[ABORTED] Interrupted.");
        }
        Err(error) => {
            eprintln!("Error: {error}");
            if let Some(hint) = error.hint() {
                eprintln!("  Hint: {hint}");
            }
        }
    }
}
