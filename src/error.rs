//! Error types shared across the trainer.

use thiserror::Error;

use crate::domain::QuestionDefect;

/// The question source could not produce usable questions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("question generation is not configured (set OPENAI_API_KEY)")]
    Disabled,
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned HTTP {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("generation response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("generated question is malformed: {0}")]
    Schema(#[from] QuestionDefect),
    #[error("expected {expected} questions, received {received}")]
    CountMismatch { expected: usize, received: usize },
}

/// Persisting or loading the application state failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Misuse of an exam session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("choice {0} is out of range")]
    InvalidChoice(usize),
    #[error("session already finished")]
    Closed,
}

/// A launch did not produce a session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    #[error("there are no missed questions to review")]
    NothingToReview,
    #[error("unknown chapter {0}")]
    UnknownChapter(u32),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}
