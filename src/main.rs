//! CLI entry point for spdl.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

mod app;
mod cli;

use app::config::ConfigError;

/// Process exit outcome, one code per failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Unrecognized,
    Usage,
    AuthRequired,
    Forbidden,
    DrmProtected,
    MergeToolMissing,
    NetworkTransient,
    Busy,
    Canceled,
}

impl ProcessExit {
    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Unrecognized => 1,
            Self::Usage => 2,
            Self::AuthRequired => 3,
            Self::Forbidden => 4,
            Self::DrmProtected => 5,
            Self::MergeToolMissing => 6,
            Self::NetworkTransient => 7,
            Self::Busy => 8,
            Self::Canceled => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        Self::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_spdl().await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            if error.downcast_ref::<ConfigError>().is_some() {
                ProcessExit::Usage.into()
            } else {
                ProcessExit::Unrecognized.into()
            }
        }
    }
}
