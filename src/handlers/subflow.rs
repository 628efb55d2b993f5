// ABOUTME: Handler that runs a nested workflow document as a single task
// ABOUTME: Accepts an inline definition or a file path, delegates to the runner plugin

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{params, HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};
use crate::engine::instance::WorkflowStatus;
use crate::parser::WorkflowDefinition;

/// Runs a nested workflow to completion and adopts its output as the task's
/// output. The document comes from exactly one of the `workflow` parameter
/// (an inline definition object or a YAML string) or the `file` parameter.
pub struct RunWorkflowHandler;

impl RunWorkflowHandler {
    async fn resolve_definition(&self, parameters: &Value) -> Result<WorkflowDefinition> {
        let inline = params::get(parameters, "workflow");
        let file = params::opt_str(parameters, "file")?;

        match (inline, file) {
            (Some(_), Some(_)) => Err(EngineError::invalid_parameter(
                "workflow",
                "'workflow' and 'file' are mutually exclusive",
            )),
            (None, None) => Err(EngineError::invalid_parameter(
                "workflow",
                "one of 'workflow' or 'file' is required",
            )),
            (Some(Value::String(yaml)), None) => Ok(WorkflowDefinition::from_yaml(yaml)?),
            (Some(value @ Value::Object(_)), None) => {
                Ok(WorkflowDefinition::from_value(value.clone())?)
            }
            (Some(_), None) => Err(EngineError::invalid_parameter(
                "workflow",
                "expected a workflow object or a YAML string",
            )),
            (None, Some(path)) => {
                let contents = tokio::fs::read_to_string(path).await?;
                Ok(WorkflowDefinition::from_yaml(&contents)?)
            }
        }
    }
}

#[async_trait]
impl TaskHandler for RunWorkflowHandler {
    fn name(&self) -> &'static str {
        "run-workflow"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let definition = self.resolve_definition(&call.parameters).await?;
        let input = params::get(&call.parameters, "input")
            .cloned()
            .unwrap_or(Value::Null);

        info!(
            "task {}: running nested workflow '{}'",
            call.task_id, definition.name
        );
        let runner = ctx.plugins.workflow_runner()?;
        let workflow = runner.run(definition, input, &ctx.cancel).await?;

        match workflow.status {
            WorkflowStatus::Completed => Ok(HandlerOutcome::Completed(workflow.output)),
            WorkflowStatus::Cancelled => Err(EngineError::Interrupted),
            status => {
                let message = workflow.error_message.unwrap_or_else(|| {
                    format!(
                        "nested workflow '{}' finished with status {}",
                        workflow.name, status
                    )
                });
                Err(EngineError::Handler(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::call_and_ctx;
    use crate::parser::TaskDefinition;
    use serde_json::json;

    fn definition() -> TaskDefinition {
        TaskDefinition {
            name: Some("nested".to_string()),
            handler: "run-workflow".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_both_sources() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({"workflow": {"name": "x"}, "file": "a.yaml"});
        let err = RunWorkflowHandler.execute(call, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_rejects_missing_source() {
        let (call, ctx) = call_and_ctx(definition(), json!({}), Value::Null);
        let err = RunWorkflowHandler.execute(call, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_parses_inline_yaml_string() {
        let yaml = "name: inner\ntasks:\n  - name: one\n    handler: log\n";
        let parsed = RunWorkflowHandler
            .resolve_definition(&json!({ "workflow": yaml }))
            .await
            .unwrap();
        assert_eq!(parsed.name, "inner");
    }
}
