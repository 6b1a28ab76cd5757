//! Message and data logging collaborators.
//!
//! The decision engine reports every command attempt to each attached
//! [`EventLogger`] in registration order. Nothing in the control path depends
//! on a logger succeeding.

pub mod data;
pub mod file;

use std::sync::Arc;

pub use data::CsvDataLogger;
pub use file::FileLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Error,
    Success,
}

#[cfg_attr(test, mockall::automock)]
pub trait EventLogger: Send + Sync {
    fn log(&self, message: &str, severity: Severity);
}

/// Console logger backed by `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl EventLogger for TracingLogger {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Debug => tracing::debug!("{message}"),
            Severity::Info => tracing::info!("{message}"),
            Severity::Success => tracing::info!(success = true, "{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
    }
}

/// Ordered set of loggers that receive every message.
#[derive(Clone, Default)]
pub struct LoggerFanout {
    loggers: Vec<Arc<dyn EventLogger>>,
}

impl LoggerFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, logger: Arc<dyn EventLogger>) {
        self.loggers.push(logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    pub fn log(&self, message: &str, severity: Severity) {
        for logger in &self.loggers {
            logger.log(message, severity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Success.to_string(), "SUCCESS");
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_fanout_in_registration_order() {
        let mut seq = Sequence::new();
        let mut first = MockEventLogger::new();
        let mut second = MockEventLogger::new();

        first
            .expect_log()
            .withf(|msg, sev| msg == "START_CHARGE" && *sev == Severity::Success)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        second
            .expect_log()
            .withf(|msg, sev| msg == "START_CHARGE" && *sev == Severity::Success)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut fanout = LoggerFanout::new();
        fanout.attach(Arc::new(first));
        fanout.attach(Arc::new(second));
        assert_eq!(fanout.len(), 2);

        fanout.log("START_CHARGE", Severity::Success);
    }
}
