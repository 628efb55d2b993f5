// ABOUTME: Handler that emits a message through every registered log sink
// ABOUTME: Severity comes from the level parameter, defaulting to info

use async_trait::async_trait;
use serde_json::Value;

use super::{params, HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};
use crate::plugin::LogLevel;

/// Writes the `message` parameter to all logger plugins at the severity in
/// the `level` parameter. Interpolation has already run, so the message may
/// carry values from the workflow scope.
pub struct LogHandler;

#[async_trait]
impl TaskHandler for LogHandler {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let message = params::require_str(&call.parameters, "message")?;
        let level = match params::opt_str(&call.parameters, "level")? {
            None => LogLevel::Info,
            Some(s) => LogLevel::parse(s)
                .ok_or_else(|| EngineError::invalid_parameter("level", "unknown log level"))?,
        };

        for sink in ctx.plugins.log_sinks() {
            sink.log(level, message);
        }
        Ok(HandlerOutcome::Completed(Value::Null))
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
            name: Some("announce".to_string()),
            handler: "log".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_logs_and_completes() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({"message": "deploy finished", "level": "warn"});
        let outcome = LogHandler.execute(call, ctx).await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Completed(Value::Null)));
    }

    #[tokio::test]
    async fn test_requires_message() {
        let (call, ctx) = call_and_ctx(definition(), json!({}), Value::Null);
        let err = LogHandler.execute(call, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_rejects_unknown_level() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({"message": "x", "level": "shout"});
        let err = LogHandler.execute(call, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
    }
}
