//! Application runtime composition modules.

pub(crate) mod args_frontend;
pub(crate) mod config;
pub(crate) mod exit_handler;
pub(crate) mod prompt_frontend;
pub(crate) mod runtime;
pub(crate) mod terminal;
