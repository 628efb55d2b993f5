// ABOUTME: Default workflow runner plugin used for nested workflow execution
// ABOUTME: Holds a weak manager handle wired up during plugin load

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{RwLock, Weak};
use tokio_util::sync::CancellationToken;

use crate::engine::error::{EngineError, Result};
use crate::engine::instance::Workflow;
use crate::engine::interpreter::Interpreter;
use crate::parser::WorkflowDefinition;
use crate::plugin::{Plugin, PluginContext, PluginManager, WorkflowRunner, PRIORITY_BUILTIN};

/// Runs nested workflows through a fresh interpreter over the same plugin
/// set as the parent run. The manager reference is weak so the runner never
/// keeps the plugin system alive past unload.
#[derive(Default)]
pub struct SessionRunner {
    manager: RwLock<Weak<PluginManager>>,
}

impl SessionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn plugins(&self) -> Result<std::sync::Arc<PluginManager>> {
        self.manager
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .upgrade()
            .ok_or_else(|| {
                EngineError::IllegalState("workflow runner used before load or after unload".into())
            })
    }
}

#[async_trait]
impl Plugin for SessionRunner {
    fn name(&self) -> &str {
        "session-runner"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUILTIN
    }

    async fn load(&self, ctx: &PluginContext) -> Result<()> {
        let manager = ctx
            .manager()
            .ok_or_else(|| EngineError::IllegalState("plugin manager dropped during load".into()))?;
        *self.manager.write().unwrap_or_else(|e| e.into_inner()) = std::sync::Arc::downgrade(&manager);
        Ok(())
    }
}

#[async_trait]
impl WorkflowRunner for SessionRunner {
    async fn run(
        &self,
        definition: WorkflowDefinition,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Workflow> {
        let interpreter = Interpreter::new(self.plugins()?);
        // Child token: parent cancellation reaches the nested run, but a
        // nested failure never cancels the parent.
        interpreter.run(definition, input, cancel.child_token()).await
    }
}
