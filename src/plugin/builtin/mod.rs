// ABOUTME: The built-in plugin pack registered by default on every manager
// ABOUTME: One low-priority default per capability, all shadowable by user plugins

pub mod interpolate;
pub mod logger;
pub mod persist;
pub mod runner;
pub mod script;

use std::sync::Arc;

use crate::config::ConfigService;
use crate::handlers::Builtins;
use crate::plugin::{PluginManager, Registration};

pub use interpolate::HandlebarsInterpolator;
pub use logger::TracingLogger;
pub use persist::MemoryStore;
pub use runner::SessionRunner;
pub use script::ExprEngine;

/// A manager with the full default plugin set registered: the built-in
/// handler pack plus one default per capability. Registration cannot fail
/// here because the names and kinds are all distinct.
pub fn default_manager(config: Arc<ConfigService>) -> Arc<PluginManager> {
    let manager = PluginManager::new(config);
    let defaults = [
        Registration::handler_resolver(Arc::new(Builtins::new())),
        Registration::interpolator(Arc::new(HandlebarsInterpolator::new())),
        Registration::script_engine(Arc::new(ExprEngine)),
        Registration::persistence(Arc::new(MemoryStore::new())),
        Registration::logger(Arc::new(TracingLogger)),
        Registration::workflow_runner(Arc::new(SessionRunner::new())),
    ];
    for registration in defaults {
        let _ = manager.register(registration);
    }
    manager
}
