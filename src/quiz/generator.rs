use async_trait::async_trait;
use thiserror::Error;

use super::{CheckRequest, ComprehensionCheck};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("no API key configured for {0}")]
    MissingCredentials(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed check: {0}")]
    Malformed(String),

    #[error("generation aborted: {0}")]
    Aborted(String),
}

/// External capability that turns a unit's text into a comprehension check.
///
/// Implementations may fail in any way; the orchestrator substitutes a local
/// fallback check for every error.
#[async_trait]
pub trait CheckGenerator: Send + Sync {
    async fn generate(&self, request: &CheckRequest) -> Result<ComprehensionCheck, CheckError>;
}
