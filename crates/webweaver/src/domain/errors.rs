//! Domain-specific errors.

use thiserror::Error;

use crate::infra::backend::BackendError;

/// Failures raised by the execution sandbox.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
    /// No realm is loaded, or the realm was torn down mid-operation.
    #[error("sandbox unavailable: no document is loaded")]
    Unavailable,
    /// The script threw synchronously; carries the thrown value's message.
    #[error("{message}")]
    Execution { message: String },
}

impl SandboxError {
    pub fn execution(message: impl Into<String>) -> Self {
        SandboxError::Execution {
            message: message.into(),
        }
    }
}

/// Failure of one analysis flow. The pipeline never retries.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{flow} unavailable: {cause}")]
    Unavailable {
        flow: &'static str,
        #[source]
        cause: AnalysisCause,
    },
}

impl AnalysisError {
    pub fn unavailable(flow: &'static str, cause: impl Into<AnalysisCause>) -> Self {
        AnalysisError::Unavailable {
            flow,
            cause: cause.into(),
        }
    }

    pub fn cause(&self) -> &AnalysisCause {
        match self {
            AnalysisError::Unavailable { cause, .. } => cause,
        }
    }
}

/// Underlying reason an analysis flow could not produce a result.
#[derive(Debug, Error)]
pub enum AnalysisCause {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("response does not match the expected shape: {0}")]
    InvalidShape(#[from] serde_json::Error),
    #[error("failed to render prompt: {0}")]
    Prompt(#[from] minijinja::Error),
    #[error("failed to build output schema: {0}")]
    Schema(#[source] serde_json::Error),
}
