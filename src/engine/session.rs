// ABOUTME: Per-run execution session holding cancellation and dynamic subtrees
// ABOUTME: Lets handlers graft child collections onto running tasks by instance id

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::factory::TaskFactory;
use super::ids::IdGenerator;
use crate::parser::TaskCollection;

/// Mutable context for one workflow run (and one nested run, which gets its
/// own session with an independent id counter and a child cancellation
/// token). Handlers attach a "currently active child container" to a task
/// instance id here instead of mutating the immutable definition tree; the
/// interpreter takes the attachment when it processes the rerun signal.
pub struct ExecutionSession {
    ids: Arc<IdGenerator>,
    factory: TaskFactory,
    cancel: CancellationToken,
    attached: Mutex<HashMap<String, TaskCollection>>,
}

impl ExecutionSession {
    pub fn new(separator: impl Into<String>, cancel: CancellationToken) -> Self {
        let ids = Arc::new(IdGenerator::new(separator));
        let factory = TaskFactory::new(Arc::clone(&ids));
        Self {
            ids,
            factory,
            cancel,
            attached: Mutex::new(HashMap::new()),
        }
    }

    pub fn factory(&self) -> &TaskFactory {
        &self.factory
    }

    pub fn separator(&self) -> &str {
        self.ids.separator()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Attach the child container to run before `task_id` is re-invoked.
    /// Replaces any previous attachment for the same task.
    pub fn set_tasks(&self, task_id: impl Into<String>, tasks: TaskCollection) {
        let mut attached = self.attached.lock().expect("session lock poisoned");
        attached.insert(task_id.into(), tasks);
    }

    /// Remove and return the attachment for `task_id`, if any. The
    /// interpreter consumes attachments exactly once per rerun.
    pub fn take_tasks(&self, task_id: &str) -> Option<TaskCollection> {
        let mut attached = self.attached.lock().expect("session lock poisoned");
        attached.remove(task_id)
    }
}
