use std::path::PathBuf;

use thiserror::Error;
use toolup_platform::ProcessError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{tool} is not installed")]
    Unavailable { tool: String },

    #[error("Command failed ({program}, {code}): {stderr}")]
    CommandFailed {
        program: String,
        code: String,
        stderr: String,
    },

    #[error(transparent)]
    ParseError(#[from] crate::types::VersionParseError),

    #[error("Unexpected {context} output: {details}")]
    UnexpectedOutput {
        context: &'static str,
        details: String,
    },

    #[error("Network error during {operation}: {details}")]
    NetworkError {
        operation: &'static str,
        details: String,
    },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Operation not supported by this backend: {operation}")]
    Unsupported { operation: &'static str },

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("Expected {expected} after install, detected {detected}")]
    VerificationMismatch { expected: String, detected: String },

    #[error("Refusing to modify protected installation at {}", path.display())]
    Protected { path: PathBuf },
}

/// Coarse classification used by the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Transient,
    VerificationMismatch,
    Protected,
}

impl BackendError {
    pub fn unexpected_output(context: &'static str, details: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            context,
            details: details.into(),
        }
    }

    pub fn network<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::NetworkError {
            operation,
            details: error.to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unavailable { .. } => FailureKind::Unavailable,
            Self::VerificationMismatch { .. } => FailureKind::VerificationMismatch,
            Self::Protected { .. } => FailureKind::Protected,
            _ => FailureKind::Transient,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// Failures a repeated read-only lookup can plausibly get past.
    /// Malformed output stays malformed, so parse errors are not retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::CommandFailed { .. }
        )
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<ProcessError> for BackendError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { program } => Self::Unavailable { tool: program },
            ProcessError::Spawn { source, .. } => source.into(),
            ProcessError::Failed {
                program,
                code,
                stderr,
            } => Self::CommandFailed {
                program,
                code,
                stderr,
            },
        }
    }
}
