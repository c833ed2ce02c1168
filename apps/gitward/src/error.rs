//! Error taxonomy shared by every command.
//!
//! Policy outcomes (scan findings, failed budgets, unresolved sync issues)
//! are reports, not errors. Only conditions that abort a command live here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed configuration, unreadable pattern registry, missing hook
    /// directory. Fatal and never partially applied.
    #[error("configuration error: {0}")]
    Config(String),

    /// A version-control command failed. The stderr is surfaced verbatim.
    #[error("`{command}` failed: {stderr}")]
    Vcs { command: String, stderr: String },

    /// The task tracker could not be reached or answered with an error.
    /// Callers degrade to id-only or untracked behavior.
    #[error("task tracker unavailable: {0}")]
    TrackerUnavailable(String),

    /// The metrics source could not produce a value for a declared budget.
    #[error("metrics unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
