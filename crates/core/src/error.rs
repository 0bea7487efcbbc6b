//! Error types for packetized streaming TTS

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input (empty text, unknown language or model)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("{0}")]
    Other(String),
}

/// Failure contract of a synthesis capability.
///
/// Everything except [`SynthesisError::Unavailable`] is scoped to a single
/// span: the stream logs it, skips the packet and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Synthesis failed: {0}")]
    Failed(String),

    #[error("Synthesis returned no audio")]
    EmptyAudio,

    #[error("Synthesis timed out after {0}ms")]
    Timeout(u64),

    /// Capability missing or misconfigured; aborts the whole stream
    #[error("Synthesis capability unavailable: {0}")]
    Unavailable(String),
}

impl SynthesisError {
    /// Whether this error must terminate the stream
    pub fn is_fatal(&self) -> bool {
        matches!(self, SynthesisError::Unavailable(_))
    }
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }
}
