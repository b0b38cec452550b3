//! # Application Errors
//!
//! Errors of the binary: engine errors, configuration errors and I/O
//! failures of the server or the CLI.

use crate::config::ConfigError;
use arbor_core::ArborError;
use thiserror::Error;

/// Any failure surfaced by a CLI command or the server loop.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] ArborError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(String),
}
