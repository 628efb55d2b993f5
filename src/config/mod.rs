// ABOUTME: Process-scoped configuration service with live change notifications
// ABOUTME: Holds a versioned key-value map and publishes snapshots on every write

use serde_json::{Map, Value};
use std::sync::RwLock;
use tokio::sync::watch;

/// A point-in-time view of the configuration map, tagged with the write
/// version that produced it.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub values: Map<String, Value>,
}

/// Shared configuration for the engine and its plugins. Writes update the
/// map and publish a snapshot atomically, so a caller that sets a key and
/// then reads it always observes its own write.
pub struct ConfigService {
    state: RwLock<ConfigSnapshot>,
    tx: watch::Sender<ConfigSnapshot>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::with_values(Map::new())
    }

    pub fn with_values(values: Map<String, Value>) -> Self {
        let snapshot = ConfigSnapshot { version: 0, values };
        let (tx, _rx) = watch::channel(snapshot.clone());
        Self {
            state: RwLock::new(snapshot),
            tx,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.read().expect("config lock poisoned");
        state.values.get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut state = self.state.write().expect("config lock poisoned");
        state.values.insert(key.into(), value);
        state.version += 1;
        // Published under the write lock so subscribers never observe a
        // snapshot older than a value the writer has already read back.
        self.tx.send_replace(state.clone());
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.state.read().expect("config lock poisoned").clone()
    }

    /// Subscribe to configuration changes. The receiver is primed with the
    /// current snapshot, so new subscribers see the latest state immediately.
    pub fn subscribe(&self) -> watch::Receiver<ConfigSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
