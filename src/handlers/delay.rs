// ABOUTME: Handler that pauses the workflow for a configured duration
// ABOUTME: Accepts a humantime string or raw milliseconds, aborts on cancellation

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{params, HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};

/// Sleeps for the `duration` parameter, given either as a humantime string
/// ("30s", "1m 15s") or as a number of milliseconds. Cancellation cuts the
/// sleep short and surfaces as an interruption.
pub struct DelayHandler;

fn parse_duration(parameters: &Value) -> Result<Duration> {
    match params::require(parameters, "duration")? {
        Value::String(s) => humantime::parse_duration(s)
            .map_err(|e| EngineError::invalid_parameter("duration", e.to_string())),
        Value::Number(n) => {
            let ms = n
                .as_u64()
                .ok_or_else(|| EngineError::invalid_parameter("duration", "expected a non-negative integer of milliseconds"))?;
            Ok(Duration::from_millis(ms))
        }
        _ => Err(EngineError::invalid_parameter(
            "duration",
            "expected a duration string or milliseconds",
        )),
    }
}

#[async_trait]
impl TaskHandler for DelayHandler {
    fn name(&self) -> &'static str {
        "delay"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let duration = parse_duration(&call.parameters)?;
        debug!("task {}: delaying for {:?}", call.task_id, duration);

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = ctx.cancel.cancelled() => return Err(EngineError::Interrupted),
        }

        Ok(HandlerOutcome::Completed(
            json!({ "duration_ms": duration.as_millis() as u64 }),
        ))
    }
}
