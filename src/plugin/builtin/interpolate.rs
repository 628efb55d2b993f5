// ABOUTME: Default interpolator plugin backed by Handlebars templates
// ABOUTME: Whole-expression references resolve to typed values, not strings

use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::Value;

use crate::engine::error::{EngineError, Result};
use crate::plugin::{Interpolator, Plugin, PRIORITY_BUILTIN};

/// Resolves `{{path.to.value}}` expressions in parameter trees against the
/// invocation scope. A string that is exactly one simple reference resolves
/// to the referenced value with its type intact; anything else renders as a
/// Handlebars template producing a string.
pub struct HandlebarsInterpolator {
    handlebars: Handlebars<'static>,
}

impl HandlebarsInterpolator {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Parameters feed shell commands and scripts, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// If `value` is exactly `{{path}}` with a plain dotted path, return the
    /// path so the lookup can preserve the referenced value's type.
    fn sole_reference(value: &str) -> Option<&str> {
        let inner = value.strip_prefix("{{")?.strip_suffix("}}")?.trim();
        let simple = !inner.is_empty()
            && inner
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        simple.then_some(inner)
    }

    fn lookup(context: &Value, path: &str) -> Value {
        let mut current = context;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return Value::Null,
            }
        }
        current.clone()
    }

    fn render(&self, template: &str, context: &Value) -> Result<Value> {
        if let Some(path) = Self::sole_reference(template) {
            return Ok(Self::lookup(context, path));
        }
        if !template.contains("{{") {
            return Ok(Value::String(template.to_string()));
        }
        let rendered = self
            .handlebars
            .render_template(template, context)
            .map_err(|e| EngineError::handler(format!("interpolation failed: {}", e)))?;
        Ok(Value::String(rendered))
    }

    fn walk(&self, value: &Value, context: &Value) -> Result<Value> {
        match value {
            Value::String(s) => self.render(s, context),
            Value::Array(items) => items
                .iter()
                .map(|item| self.walk(item, context))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.walk(item, context)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}

impl Default for HandlebarsInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for HandlebarsInterpolator {
    fn name(&self) -> &str {
        "handlebars-interpolator"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUILTIN
    }
}

#[async_trait]
impl Interpolator for HandlebarsInterpolator {
    async fn interpolate(&self, value: &Value, context: &Value) -> Result<Value> {
        self.walk(value, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Value {
        json!({
            "input": {"count": 3, "tags": ["a", "b"]},
            "variables": {"name": "backup", "enabled": true},
        })
    }

    #[tokio::test]
    async fn test_sole_reference_preserves_type() {
        let interp = HandlebarsInterpolator::new();
        let out = interp
            .interpolate(&json!("{{input.count}}"), &scope())
            .await
            .unwrap();
        assert_eq!(out, json!(3));
        let out = interp
            .interpolate(&json!("{{variables.enabled}}"), &scope())
            .await
            .unwrap();
        assert_eq!(out, json!(true));
        let out = interp
            .interpolate(&json!("{{input.tags}}"), &scope())
            .await
            .unwrap();
        assert_eq!(out, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_embedded_reference_renders_to_string() {
        let interp = HandlebarsInterpolator::new();
        let out = interp
            .interpolate(&json!("job {{variables.name}} x{{input.count}}"), &scope())
            .await
            .unwrap();
        assert_eq!(out, json!("job backup x3"));
    }

    #[tokio::test]
    async fn test_walks_nested_structures() {
        let interp = HandlebarsInterpolator::new();
        let params = json!({
            "list": ["{{input.count}}", "plain"],
            "nested": {"label": "{{variables.name}}"},
            "number": 7,
        });
        let out = interp.interpolate(&params, &scope()).await.unwrap();
        assert_eq!(
            out,
            json!({
                "list": [3, "plain"],
                "nested": {"label": "backup"},
                "number": 7,
            })
        );
    }

    #[tokio::test]
    async fn test_missing_reference_resolves_to_null() {
        let interp = HandlebarsInterpolator::new();
        let out = interp
            .interpolate(&json!("{{variables.absent}}"), &scope())
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
    }
}
