// ABOUTME: Materializes runtime task instances from immutable task definitions
// ABOUTME: Assigns session-scoped hierarchical ids; children are never pre-expanded

use std::sync::Arc;

use super::ids::IdGenerator;
use super::instance::TaskInstance;
use crate::parser::TaskDefinition;

/// Builds task instances for one execution session. Child instances for
/// branches and loop iterations are created on demand by the interpreter,
/// not here, so only the paths that actually run get records.
#[derive(Debug)]
pub struct TaskFactory {
    ids: Arc<IdGenerator>,
}

impl TaskFactory {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self { ids }
    }

    pub fn instantiate(&self, definition: &Arc<TaskDefinition>, parent: Option<&str>) -> TaskInstance {
        let id = self.ids.generate(parent);
        TaskInstance::new(id, Arc::clone(definition))
    }
}
