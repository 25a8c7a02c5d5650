//! Configuration file loading and CLI/file/default merging.
//!
//! The file is optional and read-only. CLI flags win over file values, file
//! values win over built-in defaults.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spdl_core::{ManifestProfile, OrchestratorSettings, ProfileExtension};
use thiserror::Error;

use crate::cli::Args;

const CONFIG_DIR_NAME: &str = "spdl";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading or validating the config file.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        expected: &'static str,
    },
}

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    /// Default output directory.
    pub(crate) output_dir: Option<PathBuf>,
    /// Fragments fetched in parallel (1..=32).
    pub(crate) concurrent_fragments: Option<u32>,
    /// Engine retries per request (0..=50).
    pub(crate) retries: Option<u32>,
    /// Engine retries per fragment (0..=50).
    pub(crate) fragment_retries: Option<u32>,
    /// Path to the yt-dlp executable.
    pub(crate) yt_dlp: Option<PathBuf>,
    /// Extra manifest aliases.
    pub(crate) manifest: ProfileExtension,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_range("concurrent_fragments", self.concurrent_fragments, 1..=32, "1..=32")?;
        check_range("retries", self.retries, 0..=50, "0..=50")?;
        check_range("fragment_retries", self.fragment_retries, 0..=50, "0..=50")?;
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: Option<u32>,
    range: RangeInclusive<u32>,
    expected: &'static str,
) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        field,
        value,
        expected,
    })
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadedConfig {
    /// Path that was considered, if any.
    pub(crate) path: Option<PathBuf>,
    /// Parsed values (defaults when nothing was loaded).
    pub(crate) config: FileConfig,
    /// Whether `config` came from disk.
    pub(crate) loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/spdl/config.toml`
/// 2. `$HOME/.config/spdl/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env::var_os("XDG_CONFIG_HOME"), env::var_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home.filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(xdg).join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    let home = home.filter(|value| !value.is_empty())?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is skipped when absent.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: load_file_config(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(default_path) if default_path.exists() => Ok(LoadedConfig {
            config: load_file_config(default_path)?,
            path,
            loaded_from_file: true,
        }),
        _ => Ok(LoadedConfig {
            path,
            ..LoadedConfig::default()
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

fn parse_config_str(raw: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) output_dir: PathBuf,
    pub(crate) yt_dlp: Option<PathBuf>,
    pub(crate) orchestrator: OrchestratorSettings,
    pub(crate) profile: ManifestProfile,
}

/// Merges CLI flags over file values over defaults.
pub(crate) fn resolve_settings(args: &Args, file: &FileConfig) -> RunSettings {
    let defaults = OrchestratorSettings::default();
    let retries = args.retries.or(file.retries).unwrap_or(defaults.retries);
    let orchestrator = OrchestratorSettings {
        concurrent_fragments: args
            .concurrent_fragments
            .or(file.concurrent_fragments)
            .unwrap_or(defaults.concurrent_fragments),
        retries,
        // --retries also drives fragment retries unless the file says otherwise.
        fragment_retries: args
            .retries
            .or(file.fragment_retries)
            .unwrap_or(defaults.fragment_retries),
        ..defaults
    };

    RunSettings {
        output_dir: args
            .output_dir
            .clone()
            .or_else(|| file.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        yt_dlp: args.yt_dlp.clone().or_else(|| file.yt_dlp.clone()),
        orchestrator,
        profile: ManifestProfile::default().extended(&file.manifest),
    }
}
