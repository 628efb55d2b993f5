// ABOUTME: Default script engine evaluating simple comparison expressions
// ABOUTME: Supports literals, dotted scope references, and binary comparisons

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::error::{EngineError, Result};
use crate::plugin::{Plugin, ScriptEngine, PRIORITY_BUILTIN};

/// The `expr` language: a single term or a binary comparison between two
/// terms. Terms are literals (numbers, quoted strings, true/false/null) or
/// dotted references into the invocation scope. Missing references resolve
/// to null rather than failing, matching interpolation behavior.
pub struct ExprEngine;

/// Workflow truthiness: null and false are false, numbers are true when
/// non-zero, strings and containers when non-empty.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

const OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];

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

fn term(source: &str, context: &Value) -> Result<Value> {
    let source = source.trim();
    if source.is_empty() {
        return Err(EngineError::handler("empty expression term"));
    }
    match source {
        "true" => return Ok(json!(true)),
        "false" => return Ok(json!(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }
    if (source.starts_with('\'') && source.ends_with('\'') && source.len() >= 2)
        || (source.starts_with('"') && source.ends_with('"') && source.len() >= 2)
    {
        return Ok(json!(source[1..source.len() - 1]));
    }
    if let Ok(i) = source.parse::<i64>() {
        return Ok(json!(i));
    }
    if let Ok(f) = source.parse::<f64>() {
        return Ok(json!(f));
    }
    let reference = source
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if !reference {
        return Err(EngineError::handler(format!(
            "cannot parse expression term '{}'",
            source
        )));
    }
    Ok(lookup(context, source))
}

fn numbers(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_f64()?, right.as_f64()?))
}

fn compare(operator: &str, left: &Value, right: &Value) -> Result<bool> {
    match operator {
        "==" | "!=" => {
            let equal = match numbers(left, right) {
                Some((l, r)) => l == r,
                None => left == right,
            };
            Ok(if operator == "==" { equal } else { !equal })
        }
        _ => {
            let ordering = match numbers(left, right) {
                Some((l, r)) => l.partial_cmp(&r),
                None => match (left, right) {
                    (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
                    _ => None,
                },
            };
            let ordering = ordering.ok_or_else(|| {
                EngineError::handler(format!(
                    "cannot order {} against {}",
                    left, right
                ))
            })?;
            Ok(match operator {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                ">=" => ordering.is_ge(),
                _ => unreachable!("operator list is fixed"),
            })
        }
    }
}

/// Locates the first operator outside quoted literals. Two-character
/// operators win over their one-character prefixes at the same position.
fn find_operator(source: &str) -> Option<(usize, &'static str)> {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    for at in 0..bytes.len() {
        match quote {
            Some(q) => {
                if bytes[at] == q {
                    quote = None;
                }
            }
            None => {
                if bytes[at] == b'\'' || bytes[at] == b'"' {
                    quote = Some(bytes[at]);
                    continue;
                }
                for operator in OPERATORS {
                    if source[at..].starts_with(operator) {
                        return Some((at, operator));
                    }
                }
            }
        }
    }
    None
}

fn evaluate(source: &str, context: &Value) -> Result<Value> {
    let source = source.trim();
    if let Some((at, operator)) = find_operator(source) {
        let left = term(&source[..at], context)?;
        let right = term(&source[at + operator.len()..], context)?;
        return Ok(json!(compare(operator, &left, &right)?));
    }
    term(source, context)
}

impl Plugin for ExprEngine {
    fn name(&self) -> &str {
        "expr-engine"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUILTIN
    }
}

#[async_trait]
impl ScriptEngine for ExprEngine {
    fn language(&self) -> &str {
        "expr"
    }

    fn supports(&self, extension: &str) -> bool {
        extension == "expr"
    }

    async fn run(&self, script: &str, context: &Value) -> Result<Value> {
        evaluate(script, context)
    }
}
