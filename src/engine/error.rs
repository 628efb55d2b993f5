// ABOUTME: Error types for the task execution engine
// ABOUTME: Defines the failure taxonomy consumed by retry, containers, and callers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The session's cancellation token fired. Always fatal to the in-flight
    /// operation and never retried.
    #[error("Execution interrupted")]
    Interrupted,

    #[error("Invalid parameter '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    #[error("Illegal engine state: {0}")]
    IllegalState(String),

    #[error("No plugin registered for capability '{kind}'")]
    PluginNotFound { kind: String },

    /// Anything a handler implementation raises that is not one of the
    /// conditions above. Retried per the task's retry policy.
    #[error("{0}")]
    Handler(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Definition error: {0}")]
    ParserError(#[from] crate::parser::ParserError),
}

impl EngineError {
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        EngineError::Handler(message.into())
    }

    /// Whether the retry coordinator may re-attempt after this failure.
    /// Cancellation and definition/engine invariant violations never are.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            EngineError::Interrupted
                | EngineError::InvalidParameter { .. }
                | EngineError::IllegalState(_)
                | EngineError::PluginNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
