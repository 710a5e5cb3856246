use thiserror::Error;

use toolup_platform::AppPathsError;

/// Failures that stop toolup before any backend is touched. Backend
/// failures never surface here; they are part of the run summary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Paths(#[from] AppPathsError),

    #[error("Failed to {action}: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AppError {
    pub fn io(action: &'static str, source: std::io::Error) -> Self {
        Self::Io { action, source }
    }
}
