// ABOUTME: Recovery handler running a body with catch and finally collections
// ABOUTME: A successful catch swallows the body failure; finally always runs

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};

/// Runs the task's own `tasks` body; on a non-ignored failure, runs `catch`
/// with the failure bound into the interpolation context; runs `finally`
/// afterward regardless of outcome. Implemented as a phase machine over the
/// rerun protocol, with the phase and any pending failure stored in the
/// output like every other looping handler's state.
pub struct TryHandler;

fn output_map(output: Value) -> Map<String, Value> {
    match output {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl TryHandler {
    fn enter_finally(
        &self,
        call: &HandlerCall,
        ctx: &HandlerContext,
        mut out: Map<String, Value>,
        pending: Option<String>,
    ) -> Result<HandlerOutcome> {
        if let Some(finally) = call.definition.finally.as_ref() {
            out.insert("phase".to_string(), json!("finally"));
            if let Some(message) = pending {
                out.insert("pending".to_string(), json!(message));
            }
            ctx.session.set_tasks(&call.task_id, finally.clone());
            return Ok(HandlerOutcome::Rerun(Value::Object(out)));
        }
        self.finish(out, pending)
    }

    fn finish(&self, mut out: Map<String, Value>, pending: Option<String>) -> Result<HandlerOutcome> {
        out.remove("phase");
        match pending {
            Some(message) => Err(EngineError::Handler(message)),
            None => Ok(HandlerOutcome::Completed(Value::Object(out))),
        }
    }
}

#[async_trait]
impl TaskHandler for TryHandler {
    fn name(&self) -> &'static str {
        "try"
    }

    fn handles_child_failure(&self) -> bool {
        true
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let mut out = output_map(call.output.clone());
        let phase = out
            .get("phase")
            .and_then(Value::as_str)
            .map(str::to_string);

        match phase.as_deref() {
            None => {
                out.insert("phase".to_string(), json!("body"));
                match call.definition.tasks.as_ref() {
                    Some(body) => {
                        ctx.session.set_tasks(&call.task_id, body.clone());
                        Ok(HandlerOutcome::Rerun(Value::Object(out)))
                    }
                    None => self.enter_finally(&call, &ctx, out, None),
                }
            }
            Some("body") => match call.child_failure.clone() {
                Some(message) => match call.definition.catch.as_ref() {
                    Some(catch) => {
                        debug!("try {}: body failed, entering catch: {}", call.task_id, message);
                        out.insert("phase".to_string(), json!("catch"));
                        out.insert("error".to_string(), json!({ "message": message }));
                        ctx.session.set_tasks(&call.task_id, catch.clone());
                        Ok(HandlerOutcome::Rerun(Value::Object(out)))
                    }
                    None => self.enter_finally(&call, &ctx, out, Some(message)),
                },
                None => self.enter_finally(&call, &ctx, out, None),
            },
            Some("catch") => {
                // A failing catch re-raises its own failure; a successful
                // one swallows the original body failure.
                self.enter_finally(&call, &ctx, out, call.child_failure.clone())
            }
            Some("finally") => {
                if let Some(message) = call.child_failure.clone() {
                    return Err(EngineError::Handler(message));
                }
                let pending = out
                    .remove("pending")
                    .and_then(|v| v.as_str().map(str::to_string));
                self.finish(out, pending)
            }
            Some(other) => Err(EngineError::IllegalState(format!(
                "unknown recovery phase '{}'",
                other
            ))),
        }
    }
}
