// ABOUTME: The workflow interpreter driving the invoke/rerun execution loop
// ABOUTME: Walks task collections, applies retry policy, and records run state

use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{EngineError, Result};
use super::instance::{TaskInstance, Workflow, WorkflowStatus};
use super::retry::RetryCoordinator;
use super::session::ExecutionSession;
use crate::handlers::{HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::parser::{RetryConfig, TaskCollection, WorkflowDefinition};
use crate::plugin::PluginManager;

const ID_SEPARATOR_KEY: &str = "engine.id_separator";
const DEFAULT_ID_SEPARATOR: &str = "-";
const WORKFLOW_UNIT: &str = "workflows";

/// Executes a workflow definition to a terminal state. The interpreter owns
/// the invoke/rerun loop: handlers never recurse into the engine, they hand
/// back an outcome and the interpreter runs any attached child collection
/// before re-invoking them.
pub struct Interpreter {
    plugins: Arc<PluginManager>,
}

/// Immutable per-run context threaded through the task walk.
struct RunScope {
    session: Arc<ExecutionSession>,
    input: Value,
    variables: Map<String, Value>,
    workflow_retry: Option<RetryConfig>,
}

impl Interpreter {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }

    pub async fn run(
        &self,
        definition: WorkflowDefinition,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<Workflow> {
        let separator = self
            .plugins
            .config()
            .get_str(ID_SEPARATOR_KEY)
            .unwrap_or_else(|| DEFAULT_ID_SEPARATOR.to_string());
        let session = Arc::new(ExecutionSession::new(separator, cancel));

        // Workflow variables may reference the run input.
        let interpolator = self.plugins.interpolator()?;
        let variables = match interpolator
            .interpolate(
                &Value::Object(definition.variables.clone()),
                &json!({ "input": input }),
            )
            .await?
        {
            Value::Object(map) => map,
            other => {
                return Err(EngineError::IllegalState(format!(
                    "workflow variables interpolated to a non-object: {}",
                    other
                )))
            }
        };

        let mut workflow = Workflow::new(
            uuid::Uuid::new_v4().to_string(),
            definition.name.clone(),
            input.clone(),
            variables.clone(),
        );
        info!("Starting workflow '{}' ({})", workflow.name, workflow.id);
        workflow.mark_executing();
        self.persist(&workflow).await;

        let scope = RunScope {
            session,
            input,
            variables,
            workflow_retry: definition.retry.clone(),
        };

        let result = self
            .run_collection(&scope, &definition.tasks, None, &Value::Null, &mut workflow.tasks)
            .await;

        match result {
            Ok(()) => {
                workflow.output = Self::collection_output(&definition.tasks, &workflow.tasks);
                workflow.finish(WorkflowStatus::Completed, None);
                info!("Workflow '{}' completed", workflow.name);
            }
            Err(EngineError::Interrupted) => {
                workflow.finish(WorkflowStatus::Cancelled, None);
                warn!("Workflow '{}' cancelled", workflow.name);
            }
            Err(error) => {
                let message = error.to_string();
                warn!("Workflow '{}' failed: {}", workflow.name, message);
                workflow.finish(WorkflowStatus::Error, Some(message));
            }
        }
        self.persist(&workflow).await;
        Ok(workflow)
    }

    /// The workflow-level output: a sequence yields its last task's output,
    /// a parallel container a name-to-output map.
    fn collection_output(collection: &TaskCollection, tasks: &[TaskInstance]) -> Value {
        match collection {
            TaskCollection::Sequence(_) => tasks
                .last()
                .map(|t| t.output.clone())
                .unwrap_or(Value::Null),
            TaskCollection::Parallel(_) => {
                let mut map = Map::with_capacity(tasks.len());
                for task in tasks {
                    map.insert(task.name.clone(), task.output.clone());
                }
                Value::Object(map)
            }
        }
    }

    async fn persist(&self, workflow: &Workflow) {
        if !self.plugins.has_persistence() {
            return;
        }
        let snapshot = match serde_json::to_value(workflow) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize workflow {} for persistence: {}", workflow.id, e);
                return;
            }
        };
        let store = match self.plugins.persistence() {
            Ok(p) => p,
            Err(_) => return,
        };
        if let Err(e) = store.unit(WORKFLOW_UNIT).save(&workflow.id, snapshot).await {
            warn!("Failed to persist workflow {}: {}", workflow.id, e);
        }
    }

    /// Run one child collection. Sequential collections stop at the first
    /// failure; parallel collections let every sibling settle and then
    /// surface the first failure in declaration order. Either way, every
    /// instance that started is recorded in `into`.
    fn run_collection<'a>(
        &'a self,
        scope: &'a RunScope,
        collection: &'a TaskCollection,
        parent: Option<&'a str>,
        parent_output: &'a Value,
        into: &'a mut Vec<TaskInstance>,
    ) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match collection {
                TaskCollection::Sequence(definitions) => {
                    for definition in definitions {
                        let definition = Arc::new(definition.clone());
                        let mut instance = scope.session.factory().instantiate(&definition, parent);
                        let result = self.execute_task(scope, &mut instance, parent_output).await;
                        into.push(instance);
                        result?;
                    }
                    Ok(())
                }
                TaskCollection::Parallel(definitions) => {
                    // Instances are created up front so sibling ids follow
                    // declaration order regardless of completion order.
                    let mut runs = Vec::with_capacity(definitions.len());
                    for (_name, definition) in definitions {
                        let definition = Arc::new(definition.clone());
                        let instance = scope.session.factory().instantiate(&definition, parent);
                        runs.push(async move {
                            let mut instance = instance;
                            let result =
                                self.execute_task(scope, &mut instance, parent_output).await;
                            (instance, result)
                        });
                    }

                    let mut first_error = None;
                    for (instance, result) in join_all(runs).await {
                        into.push(instance);
                        if let Err(error) = result {
                            if first_error.is_none() {
                                first_error = Some(error);
                            }
                        }
                    }
                    match first_error {
                        Some(error) => Err(error),
                        None => Ok(()),
                    }
                }
            }
        })
    }

    /// Drive one task instance to a terminal status. The loop re-invokes the
    /// handler for every rerun outcome, running any attached child
    /// collection in between with the task's own output as the parent
    /// output.
    async fn execute_task(
        &self,
        scope: &RunScope,
        instance: &mut TaskInstance,
        parent_output: &Value,
    ) -> Result<()> {
        instance.mark_started();
        debug!("Task {} ({}) starting", instance.id, instance.name);

        let handler = match self.resolve_handler(&instance.handler) {
            Ok(handler) => handler,
            Err(error) => return self.settle(instance, error),
        };
        let retry_config = instance
            .definition
            .retry
            .clone()
            .or_else(|| scope.workflow_retry.clone())
            .unwrap_or_default();
        let cancel = scope.session.cancellation_token().clone();

        let mut child_failure: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                return self.settle(instance, EngineError::Interrupted);
            }

            // `error` is the re-entry failure when one is pending, otherwise
            // whatever the attaching task recorded (catch bodies read the
            // swallowed failure from there).
            let error_value = match &child_failure {
                Some(message) => json!({ "message": message }),
                None => parent_output.get("error").cloned().unwrap_or(Value::Null),
            };
            let invocation_scope = json!({
                "input": scope.input,
                "variables": scope.variables,
                "output": instance.output,
                "parent": parent_output,
                "error": error_value,
            });

            // Parameters are re-interpolated for every invocation, reruns
            // included, so they see the latest loop state.
            let parameters = match self.interpolate_parameters(instance, &invocation_scope).await {
                Ok(parameters) => parameters,
                Err(error) => return self.settle(instance, error),
            };

            let call = HandlerCall {
                task_id: instance.id.clone(),
                definition: Arc::clone(&instance.definition),
                parameters,
                output: instance.output.clone(),
                child_failure: child_failure.take(),
            };
            let ctx = HandlerContext {
                session: Arc::clone(&scope.session),
                plugins: Arc::clone(&self.plugins),
                cancel: cancel.clone(),
                scope: invocation_scope,
            };

            let started = Instant::now();
            let mut attempts: u32 = 0;
            let invoked = Arc::clone(&handler);
            let result = RetryCoordinator::execute(
                &retry_config,
                &cancel,
                &mut attempts,
                None,
                move |_attempt| {
                    let handler = Arc::clone(&invoked);
                    let call = call.clone();
                    let ctx = ctx.clone();
                    async move { handler.execute(call, ctx).await }
                },
            )
            .await;
            instance.add_handler_duration(started.elapsed());
            instance.retries += attempts.saturating_sub(1);

            match result {
                Ok(HandlerOutcome::Completed(output)) => {
                    instance.output = output;
                    instance.mark_completed();
                    debug!("Task {} completed", instance.id);
                    return Ok(());
                }
                Ok(HandlerOutcome::Rerun(output)) => {
                    instance.output = output;
                    let Some(children) = scope.session.take_tasks(&instance.id) else {
                        continue;
                    };
                    let task_id = instance.id.clone();
                    let child_output = instance.output.clone();
                    let child_result = self
                        .run_collection(
                            scope,
                            &children,
                            Some(&task_id),
                            &child_output,
                            &mut instance.children,
                        )
                        .await;
                    match child_result {
                        Ok(()) => continue,
                        Err(EngineError::Interrupted) => {
                            return self.settle(instance, EngineError::Interrupted)
                        }
                        Err(error) => {
                            if handler.handles_child_failure() {
                                child_failure = Some(error.to_string());
                                continue;
                            }
                            return self.settle(instance, error);
                        }
                    }
                }
                Err(error) => return self.settle(instance, error),
            }
        }
    }

    fn resolve_handler(&self, name: &str) -> Result<Arc<dyn TaskHandler>> {
        for resolver in self.plugins.handler_resolvers() {
            if let Some(handler) = resolver.resolve(name) {
                return Ok(handler);
            }
        }
        Err(EngineError::IllegalState(format!(
            "no handler registered for '{}'",
            name
        )))
    }

    async fn interpolate_parameters(
        &self,
        instance: &TaskInstance,
        invocation_scope: &Value,
    ) -> Result<Value> {
        if instance.definition.parameters.is_empty() {
            return Ok(Value::Null);
        }
        let raw = Value::Object(instance.definition.parameters.clone());
        self.plugins
            .interpolator()?
            .interpolate(&raw, invocation_scope)
            .await
    }

    /// Record a failure on the instance. `ignore_error` absorbs everything
    /// except cancellation: the instance completes with the message retained
    /// and a null output, and nothing propagates.
    fn settle(&self, instance: &mut TaskInstance, error: EngineError) -> Result<()> {
        if matches!(error, EngineError::Interrupted) {
            instance.mark_error(error.to_string());
            return Err(error);
        }
        if instance.definition.ignore_error {
            warn!(
                "Task {} ({}) failed but ignore_error is set: {}",
                instance.id, instance.name, error
            );
            instance.error_message = Some(error.to_string());
            instance.output = Value::Null;
            instance.mark_completed();
            return Ok(());
        }
        instance.mark_error(error.to_string());
        Err(error)
    }
}
