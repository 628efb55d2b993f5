// ABOUTME: Parser module for YAML/JSON workflow definitions
// ABOUTME: Exports workflow document parsing, validation, and data structures

pub mod definition;
pub mod error;
pub mod validation;
pub mod workflow;

pub use definition::{RetryConfig, RetryStrategy, TaskCollection, TaskDefinition};
pub use error::{ParserError, ValidationError};
pub use workflow::{WorkflowDefinition, WorkflowParser};
