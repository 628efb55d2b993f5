// ABOUTME: Plugin registry keyed by capability with priority-ordered resolution
// ABOUTME: Drives the load/ready/unload lifecycle across all registered plugins

use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::{
    Capability, HandlerResolver, Interpolator, LogSink, Persistence, PluginContext, PluginKind,
    Registration, ScriptEngine, WorkflowRunner,
};
use crate::config::ConfigService;
use crate::engine::error::{EngineError, Result};

pub struct PluginManager {
    context: PluginContext,
    entries: RwLock<Vec<Registration>>,
}

impl PluginManager {
    /// Create an empty manager bound to a configuration service. The manager
    /// hands plugins a weak handle to itself, so it always lives in an `Arc`.
    pub fn new(config: Arc<ConfigService>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            context: PluginContext::new(config, weak.clone()),
            entries: RwLock::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &Arc<ConfigService> {
        &self.context.config
    }

    /// Register a plugin. Duplicate `(kind, name)` pairs are rejected.
    pub fn register(&self, registration: Registration) -> Result<()> {
        let mut entries = self.entries.write().expect("plugin registry poisoned");
        let kind = registration.capability.kind();
        let name = registration.plugin.name().to_string();
        if entries
            .iter()
            .any(|e| e.capability.kind() == kind && e.plugin.name() == name)
        {
            return Err(EngineError::IllegalState(format!(
                "plugin '{}' of kind '{}' is already registered",
                name, kind
            )));
        }
        debug!("Registered plugin '{}' ({})", name, kind);
        entries.push(registration);
        Ok(())
    }

    /// Load every registered plugin in registration order, awaiting each
    /// individually; a failure here aborts startup. Once all loads finished,
    /// fire each plugin's `ready` hook exactly once so it can observe the
    /// full sibling set.
    pub async fn load(&self) -> Result<()> {
        let snapshot = self.registrations();
        for entry in &snapshot {
            entry.plugin.load(&self.context).await.map_err(|e| {
                EngineError::IllegalState(format!(
                    "plugin '{}' failed to load: {}",
                    entry.plugin.name(),
                    e
                ))
            })?;
            debug!("Loaded plugin '{}'", entry.plugin.name());
        }
        for entry in &snapshot {
            entry.plugin.ready(&self.context).await.map_err(|e| {
                EngineError::IllegalState(format!(
                    "plugin '{}' failed in ready: {}",
                    entry.plugin.name(),
                    e
                ))
            })?;
        }
        info!("Loaded {} plugins", snapshot.len());
        Ok(())
    }

    /// Unload in reverse registration order. Shutdown must proceed, so
    /// failures are logged rather than propagated.
    pub async fn unload(&self) {
        let snapshot = self.registrations();
        for entry in snapshot.iter().rev() {
            if let Err(e) = entry.plugin.unload().await {
                warn!("Plugin '{}' failed to unload: {}", entry.plugin.name(), e);
            }
        }
    }

    fn registrations(&self) -> Vec<Registration> {
        self.entries
            .read()
            .expect("plugin registry poisoned")
            .clone()
    }

    /// All registrations of a kind, highest priority first; ties keep
    /// registration order.
    fn of_kind(&self, kind: PluginKind) -> Vec<Registration> {
        let mut matches: Vec<Registration> = self
            .registrations()
            .into_iter()
            .filter(|e| e.capability.kind() == kind)
            .collect();
        matches.sort_by_key(|e| std::cmp::Reverse(e.plugin.priority()));
        matches
    }

    fn one_of_kind(&self, kind: PluginKind) -> Result<Registration> {
        self.of_kind(kind)
            .into_iter()
            .next()
            .ok_or(EngineError::PluginNotFound {
                kind: kind.to_string(),
            })
    }

    pub fn interpolators(&self) -> Vec<Arc<dyn Interpolator>> {
        self.of_kind(PluginKind::Interpolator)
            .into_iter()
            .filter_map(|e| match e.capability {
                Capability::Interpolator(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn interpolator(&self) -> Result<Arc<dyn Interpolator>> {
        match self.one_of_kind(PluginKind::Interpolator)?.capability {
            Capability::Interpolator(i) => Ok(i),
            _ => unreachable!("kind filter guarantees the variant"),
        }
    }

    pub fn script_engines(&self) -> Vec<Arc<dyn ScriptEngine>> {
        self.of_kind(PluginKind::ScriptEngine)
            .into_iter()
            .filter_map(|e| match e.capability {
                Capability::ScriptEngine(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn persistence(&self) -> Result<Arc<dyn Persistence>> {
        match self.one_of_kind(PluginKind::Persistence)?.capability {
            Capability::Persistence(p) => Ok(p),
            _ => unreachable!("kind filter guarantees the variant"),
        }
    }

    pub fn has_persistence(&self) -> bool {
        !self.of_kind(PluginKind::Persistence).is_empty()
    }

    pub fn log_sinks(&self) -> Vec<Arc<dyn LogSink>> {
        self.of_kind(PluginKind::Logger)
            .into_iter()
            .filter_map(|e| match e.capability {
                Capability::Logger(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn workflow_runner(&self) -> Result<Arc<dyn WorkflowRunner>> {
        match self.one_of_kind(PluginKind::WorkflowRunner)?.capability {
            Capability::WorkflowRunner(r) => Ok(r),
            _ => unreachable!("kind filter guarantees the variant"),
        }
    }

    pub fn handler_resolvers(&self) -> Vec<Arc<dyn HandlerResolver>> {
        self.of_kind(PluginKind::HandlerResolver)
            .into_iter()
            .filter_map(|e| match e.capability {
                Capability::HandlerResolver(h) => Some(h),
                _ => None,
            })
            .collect()
    }
}
