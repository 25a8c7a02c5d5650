//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download SharePoint / Stream videos as a single playable file.
///
/// Paste a `videomanifest` URL, or a `videotranscode` / `mediasegment` URL
/// captured from the browser's network tab; segment URLs are rewritten to the
/// DASH manifest automatically. Run without a URL (or with --interactive) to
/// be prompted for everything.
#[derive(Parser, Debug)]
#[command(name = "spdl")]
#[command(author, version, about)]
pub struct Args {
    /// Video URL (manifest or media-segment URL)
    pub url: Option<String>,

    /// Netscape-format cookies file exported from a signed-in browser
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Output file name (extension optional; defaults to "<title> [<id>]")
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Directory to save into [default: .]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Prompt for URL, cookies and name instead of reading arguments
    #[arg(short, long)]
    pub interactive: bool,

    /// Config file path [default: $XDG_CONFIG_HOME/spdl/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the yt-dlp executable [default: looked up on PATH]
    #[arg(long = "yt-dlp", value_name = "PATH")]
    pub yt_dlp: Option<PathBuf>,

    /// Fragments downloaded in parallel (1-32) [default: 8]
    #[arg(short = 'N', long, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub concurrent_fragments: Option<u32>,

    /// Retry attempts for requests and fragments (0-50) [default: 10]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=50))]
    pub retries: Option<u32>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
