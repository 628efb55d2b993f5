// ABOUTME: Task definition structures forming the authored workflow tree
// ABOUTME: Defines task shapes, child collections, and retry configuration

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One authored unit of work. Definitions are immutable once parsed; the
/// engine never mutates them, it builds runtime task instances from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    /// Unique among siblings. Optional in authored form for parallel maps,
    /// where the map key supplies it during normalization.
    pub name: Option<String>,
    pub title: Option<String>,
    pub handler: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub ignore_error: bool,
    #[serde(alias = "retry_config")]
    pub retry: Option<RetryConfig>,

    // Structural shapes. A definition carries at most one of these groups,
    // matching its handler; validation enforces the pairing.
    pub tasks: Option<TaskCollection>,
    pub then: Option<TaskCollection>,
    #[serde(rename = "else")]
    pub otherwise: Option<TaskCollection>,
    pub decision_cases: Option<IndexMap<String, TaskCollection>>,
    pub default_case: Option<TaskCollection>,
    pub loop_over: Option<TaskCollection>,
    pub catch: Option<TaskCollection>,
    pub finally: Option<TaskCollection>,
}

/// A child task collection. An ordered list means sequential execution, a
/// named map means parallel execution; the shape is the only distinction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskCollection {
    Sequence(Vec<TaskDefinition>),
    Parallel(IndexMap<String, TaskDefinition>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,
    #[serde(default)]
    pub retry_strategy: RetryStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    #[default]
    Fixed,
    ExponentialBackoff,
    LinearBackoff,
}

fn default_retry_delay() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: 0,
            retry_delay_seconds: default_retry_delay(),
            retry_strategy: RetryStrategy::Fixed,
        }
    }
}

impl TaskDefinition {
    /// The effective task name. Normalization guarantees this is present on
    /// every definition reachable from a parsed workflow.
    pub fn task_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// All structural child collections this definition declares, paired
    /// with the field that declared them.
    pub fn declared_shapes(&self) -> Vec<(&'static str, &TaskCollection)> {
        let mut shapes = Vec::new();
        if let Some(c) = &self.tasks {
            shapes.push(("tasks", c));
        }
        if let Some(c) = &self.then {
            shapes.push(("then", c));
        }
        if let Some(c) = &self.otherwise {
            shapes.push(("else", c));
        }
        if let Some(cases) = &self.decision_cases {
            for (_key, c) in cases {
                shapes.push(("decision_cases", c));
            }
        }
        if let Some(c) = &self.default_case {
            shapes.push(("default_case", c));
        }
        if let Some(c) = &self.loop_over {
            shapes.push(("loop_over", c));
        }
        if let Some(c) = &self.catch {
            shapes.push(("catch", c));
        }
        if let Some(c) = &self.finally {
            shapes.push(("finally", c));
        }
        shapes
    }
}

impl TaskCollection {
    pub fn is_empty(&self) -> bool {
        match self {
            TaskCollection::Sequence(list) => list.is_empty(),
            TaskCollection::Parallel(map) => map.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TaskCollection::Sequence(list) => list.len(),
            TaskCollection::Parallel(map) => map.len(),
        }
    }

    /// Iterate children in declaration order, regardless of shape.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &TaskDefinition> + '_> {
        match self {
            TaskCollection::Sequence(list) => Box::new(list.iter()),
            TaskCollection::Parallel(map) => Box::new(map.values()),
        }
    }

    fn iter_mut(&mut self) -> Box<dyn Iterator<Item = &mut TaskDefinition> + '_> {
        match self {
            TaskCollection::Sequence(list) => Box::new(list.iter_mut()),
            TaskCollection::Parallel(map) => Box::new(map.values_mut()),
        }
    }

    /// Fill in missing names from parallel map keys, recursively. Sequential
    /// children must carry their own names; validation reports those.
    pub fn normalize(&mut self) {
        if let TaskCollection::Parallel(map) = self {
            for (key, task) in map.iter_mut() {
                if task.name.is_none() {
                    task.name = Some(key.clone());
                }
            }
        }
        for task in self.iter_mut() {
            if let Some(c) = task.tasks.as_mut() {
                c.normalize();
            }
            if let Some(c) = task.then.as_mut() {
                c.normalize();
            }
            if let Some(c) = task.otherwise.as_mut() {
                c.normalize();
            }
            if let Some(cases) = task.decision_cases.as_mut() {
                for (_key, c) in cases.iter_mut() {
                    c.normalize();
                }
            }
            if let Some(c) = task.default_case.as_mut() {
                c.normalize();
            }
            if let Some(c) = task.loop_over.as_mut() {
                c.normalize();
            }
            if let Some(c) = task.catch.as_mut() {
                c.normalize();
            }
            if let Some(c) = task.finally.as_mut() {
                c.normalize();
            }
        }
    }
}
