use crate::core::JobSnapshot;

/// Severity of a structured engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Structured-event sink consumed by the engine.
///
/// The engine emits events; what happens to them (formatting, files,
/// rotation) is the sink implementor's business. Implementations must not
/// block: sinks are called from the dispatcher and scheduler loops.
pub trait EventSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    /// Event carrying job context.
    fn log_job(&self, level: LogLevel, job: &JobSnapshot, message: &str);
}

/// Default sink: forwards events to `tracing` at the matching level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
    }

    fn log_job(&self, level: LogLevel, job: &JobSnapshot, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(
                job = %job.name,
                cpu_time = job.cpu_time,
                priority = job.priority,
                status = %job.status,
                "{message}"
            ),
            LogLevel::Info => tracing::info!(
                job = %job.name,
                cpu_time = job.cpu_time,
                priority = job.priority,
                status = %job.status,
                "{message}"
            ),
            LogLevel::Warn => tracing::warn!(
                job = %job.name,
                cpu_time = job.cpu_time,
                priority = job.priority,
                status = %job.status,
                "{message}"
            ),
            LogLevel::Error => tracing::error!(
                job = %job.name,
                cpu_time = job.cpu_time,
                priority = job.priority,
                status = %job.status,
                "{message}"
            ),
        }
    }
}
