// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildRunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Command not found: {0}")]
    MissingCommand(String),

    #[error("append called on a closed output sink")]
    SinkClosed,

    /// A child process exited non-zero, was signalled or was killed.
    ///
    /// Used to stop a build/run sequence; the run itself is still reported
    /// as a `RunResult`.
    #[error("{job} failed with code {failure}")]
    ExecutionFailed { job: String, failure: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildRunError>;
