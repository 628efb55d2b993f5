// ABOUTME: Workflow document structure and parsing functionality
// ABOUTME: Defines the authored WorkflowDefinition and YAML/JSON parsing entry points

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;

use super::definition::{RetryConfig, TaskCollection};
use super::error::{ParserError, Result, ValidationError};
use super::validation::validate_collection;

fn default_version() -> String {
    "1.0".to_string()
}

/// The authored workflow document: a named root container over a task
/// collection, plus run-scoped variables and an inheritable retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    pub tasks: TaskCollection,
    pub retry: Option<RetryConfig>,
}

impl WorkflowDefinition {
    /// Parse a workflow document from a YAML (or JSON, which YAML subsumes)
    /// string, normalize child names, and validate the structure.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut doc: WorkflowDefinition = serde_yaml::from_str(content)?;
        doc.tasks.normalize();
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse from an already-deserialized value, as used by the run-workflow
    /// handler for inline documents.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut doc: WorkflowDefinition = serde_json::from_value(value)?;
        doc.tasks.normalize();
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }
        if self.tasks.is_empty() {
            return Err(ValidationError::EmptyWorkflow.into());
        }
        validate_collection(&self.name, &self.tasks)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowParser;

impl WorkflowParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition> {
        let content = fs::read_to_string(path.as_ref()).await?;
        self.parse_string(&content)
    }

    pub fn parse_string(&self, content: &str) -> Result<WorkflowDefinition> {
        WorkflowDefinition::from_yaml(content)
    }
}
