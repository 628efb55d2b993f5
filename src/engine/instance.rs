// ABOUTME: Runtime task instance and workflow records with status lifecycles
// ABOUTME: Serializable state tracked by the interpreter and handed to persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::parser::TaskDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Executing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Open,
    Executing,
    Completed,
    Error,
    Cancelled,
}

/// One execution of a task definition. Children are created lazily: only the
/// branch or iteration that actually ran leaves a record here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: String,
    pub name: String,
    pub handler: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub output: Value,
    pub time_started: Option<DateTime<Utc>>,
    pub time_completed: Option<DateTime<Utc>>,
    pub handler_duration: Option<Duration>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub children: Vec<TaskInstance>,
    #[serde(skip)]
    pub definition: Arc<TaskDefinition>,
}

impl TaskInstance {
    pub fn new(id: String, definition: Arc<TaskDefinition>) -> Self {
        Self {
            id,
            name: definition.task_name().to_string(),
            handler: definition.handler.clone(),
            status: TaskStatus::Pending,
            output: Value::Null,
            time_started: None,
            time_completed: None,
            handler_duration: None,
            error_message: None,
            retries: 0,
            children: Vec::new(),
            definition,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = TaskStatus::Executing;
        self.time_started = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.time_completed = Some(Utc::now());
    }

    pub fn mark_error(&mut self, message: String) {
        self.status = TaskStatus::Error;
        self.error_message = Some(message);
        self.time_completed = Some(Utc::now());
    }

    pub fn add_handler_duration(&mut self, elapsed: Duration) {
        self.handler_duration = Some(match self.handler_duration {
            Some(total) => total + elapsed,
            None => elapsed,
        });
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// The per-run workflow record. Exclusively owned by its execution session
/// while running; a snapshot goes to the persistence plugin on every status
/// transition, keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub output: Value,
    pub error_message: Option<String>,
    pub time_started: Option<DateTime<Utc>>,
    pub time_completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: Vec<TaskInstance>,
}

impl Workflow {
    pub fn new(id: String, name: String, input: Value, variables: Map<String, Value>) -> Self {
        Self {
            id,
            name,
            status: WorkflowStatus::Open,
            input,
            variables,
            output: Value::Null,
            error_message: None,
            time_started: None,
            time_completed: None,
            tasks: Vec::new(),
        }
    }

    pub fn mark_executing(&mut self) {
        self.status = WorkflowStatus::Executing;
        self.time_started = Some(Utc::now());
    }

    pub fn finish(&mut self, status: WorkflowStatus, error_message: Option<String>) {
        self.status = status;
        self.error_message = error_message;
        self.time_completed = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WorkflowStatus::Completed | WorkflowStatus::Error | WorkflowStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Executing => "executing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Open => "open",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Error => "error",
            WorkflowStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}
