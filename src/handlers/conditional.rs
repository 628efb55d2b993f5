// ABOUTME: Branching handlers: binary comparison (if) and value dispatch (switch)
// ABOUTME: Both attach the selected branch through the session and rerun once

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{params, HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};

pub struct IfHandler;

fn compare(left: &Value, operator: &str, right: &Value) -> Result<bool> {
    match operator {
        "==" => Ok(loose_eq(left, right)),
        "!=" => Ok(!loose_eq(left, right)),
        "<" | "<=" | ">" | ">=" => {
            let ordering = if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
                l.partial_cmp(&r)
            } else if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
                Some(l.cmp(r))
            } else {
                None
            };
            let ordering = ordering.ok_or_else(|| {
                EngineError::invalid_parameter("operator", "operands cannot be ordered")
            })?;
            Ok(match operator {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        other => Err(EngineError::invalid_parameter(
            "operator",
            format!("unsupported operator '{}'", other),
        )),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l == r;
    }
    left == right
}

#[async_trait]
impl TaskHandler for IfHandler {
    fn name(&self) -> &'static str {
        "if"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        // Re-entry after the attached branch ran; the condition is decided.
        if call.output.get("condition").is_some() {
            return Ok(HandlerOutcome::Completed(call.output));
        }

        let left = params::require(&call.parameters, "left")?;
        let operator = params::require_str(&call.parameters, "operator")?;
        let right = params::require(&call.parameters, "right")?;
        let condition = compare(left, operator, right)?;
        debug!("if {}: {} {} {} -> {}", call.task_id, left, operator, right, condition);

        let output = json!({ "condition": condition });
        let branch = if condition {
            call.definition.then.as_ref()
        } else {
            call.definition.otherwise.as_ref()
        };
        match branch {
            Some(collection) => {
                ctx.session.set_tasks(&call.task_id, collection.clone());
                Ok(HandlerOutcome::Rerun(output))
            }
            None => Ok(HandlerOutcome::Completed(output)),
        }
    }
}

pub struct SwitchHandler;

fn case_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TaskHandler for SwitchHandler {
    fn name(&self) -> &'static str {
        "switch"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        if call.output.get("case").is_some() {
            return Ok(HandlerOutcome::Completed(call.output));
        }

        let value = params::require(&call.parameters, "value")?;
        let key = case_key(value);
        let cases = call.definition.decision_cases.as_ref().ok_or_else(|| {
            EngineError::invalid_parameter("decision_cases", "missing on switch task")
        })?;

        if let Some(collection) = cases.get(&key) {
            ctx.session.set_tasks(&call.task_id, collection.clone());
            return Ok(HandlerOutcome::Rerun(json!({ "case": key })));
        }
        if let Some(default) = call.definition.default_case.as_ref() {
            ctx.session.set_tasks(&call.task_id, default.clone());
            return Ok(HandlerOutcome::Rerun(json!({ "case": "default" })));
        }
        // No match and no default: complete with no children.
        Ok(HandlerOutcome::Completed(json!({ "case": Value::Null })))
    }
}
