// ABOUTME: Error types for workflow definition parsing and validation
// ABOUTME: Defines specific error types for parser module operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read workflow file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Duplicate task name '{task}' among children of '{parent}'")]
    DuplicateTask { parent: String, task: String },

    #[error("Task at position {index} under '{parent}' has no name")]
    UnnamedTask { parent: String, index: usize },

    #[error("Invalid task definition for '{task}': {reason}")]
    InvalidTaskDefinition { task: String, reason: String },

    #[error("Empty workflow: no tasks defined")]
    EmptyWorkflow,
}

pub type Result<T> = std::result::Result<T, ParserError>;
