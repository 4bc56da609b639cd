//! Common error types for Canvass

use thiserror::Error;

/// Common result type for Canvass operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Canvass workspace
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing required input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested survey/group/question does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Question kind outside the closed set of five
    ///
    /// Unreachable through the QuestionKind enum itself; fires when a stored
    /// kind string fails to parse. Must never be silently swallowed.
    #[error("Unsupported question kind: {0}")]
    UnsupportedQuestionKind(String),

    /// Concurrent modification of the same answer or question row
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Live access to a survey that has not been published
    #[error("Survey not published: {0}")]
    NotPublished(String),

    /// Respondent has already completed this survey
    #[error("Survey already completed: {0}")]
    AlreadyCompleted(String),
}
