// ABOUTME: Execution engine module for running parsed workflow definitions
// ABOUTME: Exports the interpreter, sessions, retry, and runtime state types

pub mod error;
pub mod factory;
pub mod ids;
pub mod instance;
pub mod interpreter;
pub mod retry;
pub mod session;

pub use error::{EngineError, Result};
pub use ids::IdGenerator;
pub use instance::{TaskInstance, TaskStatus, Workflow, WorkflowStatus};
pub use interpreter::Interpreter;
pub use retry::RetryCoordinator;
pub use session::ExecutionSession;
