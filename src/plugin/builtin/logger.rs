// ABOUTME: Default logger plugin forwarding workflow log messages to tracing
// ABOUTME: Messages carry a target so they are filterable separately from engine logs

use tracing::{debug, error, info, warn};

use crate::plugin::{LogLevel, LogSink, Plugin, PRIORITY_BUILTIN};

/// Routes workflow `log` task messages into the process's tracing
/// subscriber under the `workflow` target.
pub struct TracingLogger;

impl Plugin for TracingLogger {
    fn name(&self) -> &str {
        "tracing-logger"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUILTIN
    }
}

impl LogSink for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "workflow", "{}", message),
            LogLevel::Info => info!(target: "workflow", "{}", message),
            LogLevel::Warn => warn!(target: "workflow", "{}", message),
            LogLevel::Error => error!(target: "workflow", "{}", message),
        }
    }
}
