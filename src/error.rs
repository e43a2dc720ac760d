//! Typed errors for the harness.
//!
//! Every failure mode maps onto a process exit code so the CLI surface can
//! report it without parsing messages.

use thiserror::Error;

use crate::constants::{
    EXIT_BACKEND_UNAVAILABLE, EXIT_CONFIGURATION_ERROR, EXIT_FAILURE, EXIT_INPUT_ERROR,
};
use crate::registry::Stage;

/// Errors arising from loading inputs, resolving units or running stages.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Malformed or missing matrix, results file or permutation.
    #[error("input error: {0}")]
    Input(String),

    /// Unsafe path token, malformed parameter or unresolvable unit.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required device backend is absent.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The invoked technique or kernel exited nonzero.
    #[error("{stage} unit '{name}' failed with exit code {exit_code}")]
    StageExecution {
        stage: Stage,
        name: String,
        exit_code: i32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input(_) => EXIT_INPUT_ERROR,
            Self::Configuration(_) => EXIT_CONFIGURATION_ERROR,
            Self::BackendUnavailable(_) => EXIT_BACKEND_UNAVAILABLE,
            Self::StageExecution { exit_code, .. } => *exit_code,
            Self::Io(_) | Self::Csv(_) | Self::Json(_) => EXIT_FAILURE,
        }
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
