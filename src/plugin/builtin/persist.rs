// ABOUTME: Default in-memory persistence plugin with named storage units
// ABOUTME: Units are created on first use and live for the manager's lifetime

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::engine::error::Result;
use crate::plugin::{Persistence, PersistenceUnit, Plugin, PRIORITY_BUILTIN};

/// In-memory persistence. Each named unit is an independent id-to-document
/// map. Useful as the default store and for tests; a durable store registers
/// at a higher priority and shadows this one.
#[derive(Default)]
pub struct MemoryStore {
    units: Mutex<HashMap<String, Arc<MemoryUnit>>>,
}

#[derive(Default)]
pub struct MemoryUnit {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for MemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUILTIN
    }
}

impl Persistence for MemoryStore {
    fn unit(&self, name: &str) -> Arc<dyn PersistenceUnit> {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        units
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryUnit::default()))
            .clone()
    }
}

#[async_trait]
impl PersistenceUnit for MemoryUnit {
    async fn save(&self, id: &str, data: Value) -> Result<()> {
        self.entries.write().await.insert(id.to_string(), data);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
