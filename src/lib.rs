//! spdl Core Library
//!
//! Resolves SharePoint / Stream (on SharePoint) video links into DASH manifest
//! URLs and drives an external fetch/merge engine to turn them into a single
//! playable file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`resolver`] - URL classification and media-segment → manifest rewriting
//! - [`download`] - Download orchestration, progress relay, failure classification,
//!   and the `yt-dlp` engine adapter
//!
//! Front ends (terminal prompts, argument parsing, progress rendering) live in the
//! `spdl` binary and talk to this crate only through [`classify`], [`rewrite`],
//! [`resolve`], and [`Orchestrator::run`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod resolver;

// Re-export commonly used types
pub use download::{
    ClassifiedError, DownloadError, DownloadRequest, EngineConfig, EngineEvent, FetchEngine,
    Orchestrator, OrchestratorSettings, OutputTarget, ProgressEvent, ProgressSink, Reservations,
    TerminalSignal, YtDlpEngine, classify_failure,
};
pub use resolver::{
    ManifestProfile, ProfileExtension, Resolution, UrlShape, classify, resolve, rewrite,
};
