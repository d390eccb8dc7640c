use miette::Diagnostic;
use thiserror::Error;

use crate::backend::BackendError;
use crate::batch::BatchError;
use crate::config::ConfigError;
use crate::coverage::{CoverageError, ProfileError};

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Coverage(#[from] CoverageError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid input: {message}")]
    #[diagnostic(code(qbank::cli::invalid_input))]
    InvalidInput { message: String },

    #[error("Failed to encode output: {message}")]
    #[diagnostic(code(qbank::cli::encode))]
    Encode { message: String },
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Encode {
            message: e.to_string(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
