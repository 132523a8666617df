//! Application runtime composition modules.

pub(crate) mod config_runtime;
pub(crate) mod exit_handler;
pub(crate) mod input;
pub(crate) mod progress_manager;
pub(crate) mod report;
pub(crate) mod runtime;
pub(crate) mod terminal;
