use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the news provider. None of them are retried or cached.
#[derive(Debug, Error)]
pub enum NewsError {
    #[error("the news provider API key is not configured")]
    MissingApiKey,

    #[error("could not reach the news provider")]
    Request(#[from] reqwest::Error),

    #[error("the news provider responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("the news provider returned a malformed response")]
    Malformed(#[from] serde_json::Error),

    #[error("the news provider reported an error: {0}")]
    Provider(String),
}

impl NewsError {
    /// Whether the server, rather than the upstream, is at fault.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingApiKey)
    }
}
