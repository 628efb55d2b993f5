// ABOUTME: Handler that evaluates a script expression through a script engine plugin
// ABOUTME: Engine selection by explicit language, file extension, or configured default

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{params, HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};
use crate::plugin::ScriptEngine;

const DEFAULT_LANGUAGE_KEY: &str = "engine.default_language";
const DEFAULT_LANGUAGE: &str = "expr";

/// Evaluates an inline `script` or a script `file` against the invocation
/// scope and completes with the evaluation result. The engine is picked by
/// the `language` parameter when given, by the file extension for files,
/// and by the configured default language otherwise.
pub struct LambdaHandler;

impl LambdaHandler {
    fn by_language(ctx: &HandlerContext, language: &str) -> Result<Arc<dyn ScriptEngine>> {
        ctx.plugins
            .script_engines()
            .into_iter()
            .find(|e| e.language() == language)
            .ok_or_else(|| {
                EngineError::IllegalState(format!("no script engine for language '{}'", language))
            })
    }

    fn by_extension(ctx: &HandlerContext, path: &str) -> Option<Arc<dyn ScriptEngine>> {
        let extension = Path::new(path).extension()?.to_str()?.to_string();
        ctx.plugins
            .script_engines()
            .into_iter()
            .find(|e| e.supports(&extension))
    }

    fn default_language(ctx: &HandlerContext) -> String {
        ctx.plugins
            .config()
            .get_str(DEFAULT_LANGUAGE_KEY)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }
}

#[async_trait]
impl TaskHandler for LambdaHandler {
    fn name(&self) -> &'static str {
        "lambda"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let inline = params::opt_str(&call.parameters, "script")?;
        let file = params::opt_str(&call.parameters, "file")?;
        let language = params::opt_str(&call.parameters, "language")?;

        let (source, engine) = match (inline, file) {
            (Some(_), Some(_)) => {
                return Err(EngineError::invalid_parameter(
                    "script",
                    "'script' and 'file' are mutually exclusive",
                ))
            }
            (None, None) => {
                return Err(EngineError::invalid_parameter(
                    "script",
                    "one of 'script' or 'file' is required",
                ))
            }
            (Some(script), None) => {
                let language = language
                    .map(str::to_string)
                    .unwrap_or_else(|| Self::default_language(&ctx));
                (script.to_string(), Self::by_language(&ctx, &language)?)
            }
            (None, Some(path)) => {
                let engine = match language {
                    Some(language) => Self::by_language(&ctx, language)?,
                    None => Self::by_extension(&ctx, path).ok_or_else(|| {
                        EngineError::IllegalState(format!(
                            "no script engine supports file '{}'",
                            path
                        ))
                    })?,
                };
                let source = tokio::fs::read_to_string(path).await?;
                (source, engine)
            }
        };

        debug!(
            "task {}: evaluating {} script ({} chars)",
            call.task_id,
            engine.language(),
            source.len()
        );
        let result = engine.run(&source, &ctx.scope).await?;
        Ok(HandlerOutcome::Completed(result))
    }
}
