// ABOUTME: Looping handlers: counted for, condition-driven while, sequence iterate
// ABOUTME: Each persists its loop state in the task output and iterates via rerun

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{params, HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};
use crate::plugin::builtin::script::truthy;

fn attach_body(call: &HandlerCall, ctx: &HandlerContext) -> Result<()> {
    let body = call
        .definition
        .loop_over
        .as_ref()
        .ok_or_else(|| EngineError::invalid_parameter("loop_over", "missing loop body"))?;
    ctx.session.set_tasks(&call.task_id, body.clone());
    Ok(())
}

fn state_i64(output: &Value, field: &str) -> Result<i64> {
    output.get(field).and_then(Value::as_i64).ok_or_else(|| {
        EngineError::IllegalState(format!("loop state field '{}' is missing or corrupt", field))
    })
}

pub struct ForHandler;

#[async_trait]
impl TaskHandler for ForHandler {
    fn name(&self) -> &'static str {
        "for"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        // The first invocation is detected by the absence of numeric loop
        // state; everything after that reads only what the previous
        // invocation stored in the output.
        let seeded = call.output.get("from").and_then(Value::as_i64).is_some();
        let (from, to, step, mut index, mut iteration) = if seeded {
            (
                state_i64(&call.output, "from")?,
                state_i64(&call.output, "to")?,
                state_i64(&call.output, "step")?,
                state_i64(&call.output, "index")?,
                state_i64(&call.output, "iteration")?,
            )
        } else {
            let from = params::require_i64(&call.parameters, "from")?;
            let to = params::require_i64(&call.parameters, "to")?;
            let step = params::opt_i64(&call.parameters, "step")?.unwrap_or(1);
            if step == 0 {
                return Err(EngineError::invalid_parameter("step", "must not be zero"));
            }
            (from, to, step, from, 0)
        };

        let keeps_going = if step > 0 { index <= to } else { index >= to };
        if !keeps_going {
            debug!("for {}: finished after {} iterations", call.task_id, iteration);
            return Ok(HandlerOutcome::Completed(json!({
                "from": from, "to": to, "step": step,
                "index": index, "iteration": iteration,
            })));
        }

        attach_body(&call, &ctx)?;
        index += step;
        iteration += 1;
        Ok(HandlerOutcome::Rerun(json!({
            "from": from, "to": to, "step": step,
            "index": index, "iteration": iteration,
        })))
    }
}

pub struct WhileHandler;

#[derive(PartialEq)]
enum WhileMode {
    WhileDo,
    DoWhile,
}

fn while_mode(parameters: &Value) -> Result<WhileMode> {
    match params::opt_str(parameters, "mode")? {
        None => Ok(WhileMode::WhileDo),
        Some(raw) => match raw.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "whiledo" => Ok(WhileMode::WhileDo),
            "dowhile" => Ok(WhileMode::DoWhile),
            _ => Err(EngineError::invalid_parameter(
                "mode",
                format!("unknown while mode '{}'", raw),
            )),
        },
    }
}

impl WhileHandler {
    async fn condition(&self, call: &HandlerCall, ctx: &HandlerContext, output: &Value) -> Result<bool> {
        let condition = params::require_str(&call.parameters, "condition")?;
        let language = match params::opt_str(&call.parameters, "language")? {
            Some(lang) => lang.to_string(),
            None => ctx
                .plugins
                .config()
                .get_str("engine.default_language")
                .unwrap_or_else(|| "expr".to_string()),
        };
        let engine = ctx
            .plugins
            .script_engines()
            .into_iter()
            .find(|e| e.language() == language)
            .ok_or_else(|| {
                EngineError::IllegalState(format!("no script engine for language '{}'", language))
            })?;

        // Evaluate against the invocation scope with the freshest loop state
        // substituted in, so `output.iteration` is always present.
        let mut scope = ctx.scope.clone();
        if let Value::Object(map) = &mut scope {
            map.insert("output".to_string(), output.clone());
        }
        let result = engine.run(condition, &scope).await?;
        Ok(truthy(&result))
    }
}

#[async_trait]
impl TaskHandler for WhileHandler {
    fn name(&self) -> &'static str {
        "while"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let mode = while_mode(&call.parameters)?;
        let first = call.output.get("iteration").is_none();
        let mut iteration = if first {
            0
        } else {
            state_i64(&call.output, "iteration")?
        };

        // doWhile runs the body once before the first condition check.
        if first && mode == WhileMode::DoWhile {
            attach_body(&call, &ctx)?;
            return Ok(HandlerOutcome::Rerun(json!({ "iteration": 1 })));
        }

        let state = json!({ "iteration": iteration });
        if self.condition(&call, &ctx, &state).await? {
            attach_body(&call, &ctx)?;
            iteration += 1;
            Ok(HandlerOutcome::Rerun(json!({ "iteration": iteration })))
        } else {
            debug!("while {}: finished after {} iterations", call.task_id, iteration);
            Ok(HandlerOutcome::Completed(state))
        }
    }
}

pub struct IterateHandler;

fn normalize_items(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect()),
        _ => Err(EngineError::invalid_parameter(
            "items",
            "expected an array or an object",
        )),
    }
}

#[async_trait]
impl TaskHandler for IterateHandler {
    fn name(&self) -> &'static str {
        "iterate"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let items = normalize_items(params::require(&call.parameters, "items")?)?;

        let next = match call.output.get("iteration").and_then(Value::as_i64) {
            None => 0,
            Some(done) => done + 1,
        };

        if (next as usize) < items.len() {
            attach_body(&call, &ctx)?;
            return Ok(HandlerOutcome::Rerun(json!({
                "iteration": next,
                "item": items[next as usize],
            })));
        }

        // Exhausted: drop the item, keep the rest of the state.
        let mut output = match call.output {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        output.remove("item");
        Ok(HandlerOutcome::Completed(Value::Object(output)))
    }
}
