use std::time::Duration;
use thiserror::Error;

/// Startup-time configuration problems. These abort the process before any
/// request is served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file or environment")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Per-request failures. Every variant is recovered at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image or instruction missing")]
    MissingInput,

    #[error("model call failed: {0:#}")]
    ExternalCall(#[from] anyhow::Error),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model response contained no parseable JSON block")]
    NoStructuredResult,

    #[error("failed to encode input image: {0}")]
    ImageEncode(#[source] image::ImageError),

    #[error("failed to decode label image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub const PROMPT_USER_MESSAGE: &str = "Please upload an image and select/enter a prompt.";
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing the request.";
pub const TIMEOUT_MESSAGE: &str = "The model took too long to respond. Please try again.";

impl PipelineError {
    /// Text shown to the user in place of a result. Raw error details stay in
    /// the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::MissingInput => PROMPT_USER_MESSAGE,
            PipelineError::Timeout(_) => TIMEOUT_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}
