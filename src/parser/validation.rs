// ABOUTME: Structural validation for parsed workflow definitions
// ABOUTME: Enforces sibling name uniqueness and handler/shape pairing rules

use std::collections::HashSet;

use super::definition::{TaskCollection, TaskDefinition};
use super::error::{Result, ValidationError};

/// Validate a child collection recursively: every sequential child is named,
/// sibling names are unique, and each definition's structural shape matches
/// its handler.
pub fn validate_collection(parent: &str, collection: &TaskCollection) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, task) in collection.iter().enumerate() {
        let name = match &task.name {
            Some(name) if !name.trim().is_empty() => name.as_str(),
            _ => {
                return Err(ValidationError::UnnamedTask {
                    parent: parent.to_string(),
                    index,
                }
                .into())
            }
        };
        if !seen.insert(name.to_string()) {
            return Err(ValidationError::DuplicateTask {
                parent: parent.to_string(),
                task: name.to_string(),
            }
            .into());
        }
        validate_task(task)?;
    }
    Ok(())
}

fn invalid(task: &TaskDefinition, reason: &str) -> ValidationError {
    ValidationError::InvalidTaskDefinition {
        task: task.task_name().to_string(),
        reason: reason.to_string(),
    }
}

fn validate_task(task: &TaskDefinition) -> Result<()> {
    match task.handler.as_str() {
        "if" => {
            if task.then.is_none() && task.otherwise.is_none() {
                return Err(invalid(task, "'if' requires a 'then' or 'else' branch").into());
            }
            if task.tasks.is_some() {
                return Err(invalid(task, "'if' must not also declare 'tasks'").into());
            }
        }
        "switch" => {
            if task.decision_cases.is_none() {
                return Err(invalid(task, "'switch' requires 'decision_cases'").into());
            }
        }
        "for" | "while" | "iterate" => {
            if task.loop_over.is_none() {
                return Err(invalid(task, "loop handlers require 'loop_over'").into());
            }
        }
        _ => {}
    }

    // Branch shapes are only meaningful on the handler that consumes them.
    if task.handler != "if" && (task.then.is_some() || task.otherwise.is_some()) {
        return Err(invalid(task, "'then'/'else' are only valid on an 'if' task").into());
    }
    if task.handler != "switch" && (task.decision_cases.is_some() || task.default_case.is_some()) {
        return Err(invalid(
            task,
            "'decision_cases'/'default_case' are only valid on a 'switch' task",
        )
        .into());
    }
    if !matches!(task.handler.as_str(), "for" | "while" | "iterate") && task.loop_over.is_some() {
        return Err(invalid(task, "'loop_over' is only valid on a loop task").into());
    }
    if task.finally.is_some() && task.catch.is_none() && task.tasks.is_none() {
        return Err(invalid(task, "'finally' requires a task body").into());
    }

    // Recurse into every declared child collection.
    for (_field, collection) in task.declared_shapes() {
        validate_collection(task.task_name(), collection)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::WorkflowDefinition;

    #[test]
    fn test_if_requires_branch() {
        let yaml = r#"
name: bad
tasks:
  - name: check
    handler: if
    parameters:
      left: 1
      operator: "=="
      right: 1
"#;
        assert!(WorkflowDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_if_rejects_generic_tasks() {
        let yaml = r#"
name: bad
tasks:
  - name: check
    handler: if
    then:
      - name: a
        handler: log
    tasks:
      - name: b
        handler: log
"#;
        assert!(WorkflowDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_duplicate_sibling_names() {
        let yaml = r#"
name: bad
tasks:
  - name: same
    handler: log
  - name: same
    handler: log
"#;
        assert!(WorkflowDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_loop_requires_body() {
        let yaml = r#"
name: bad
tasks:
  - name: spin
    handler: for
    parameters:
      from: 0
      to: 3
"#;
        assert!(WorkflowDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_nested_validation() {
        let yaml = r#"
name: nested
tasks:
  - name: outer
    handler: if
    parameters:
      left: 1
      operator: "=="
      right: 1
    then:
      - name: inner
        handler: for
        parameters:
          from: 0
          to: 2
        loop_over:
          - name: body
            handler: log
            parameters:
              message: hi
"#;
        assert!(WorkflowDefinition::from_yaml(yaml).is_ok());
    }
}
