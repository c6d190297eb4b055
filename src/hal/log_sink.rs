//! Debug sinks backed by the `log` facade.

use core::fmt;

use crate::traits::{DebugSink, Severity};

/// Log target used for every record.
pub const LOG_TARGET: &str = "motorboard";

/// Forwards diagnostics to whatever `log` backend the firmware installed
/// (`EspLogger` on the ESP32, `env_logger` or similar on a host).
///
/// # Example
///
/// ```rust
/// use rs_motorboard::hal::LogSink;
/// use rs_motorboard::traits::{DebugSink, Severity};
///
/// // Without a logger installed the record is dropped.
/// LogSink.emit(Severity::Info, format_args!("Motor Driver [TMC6200] successfully initialized!"));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl LogSink {
    /// `log` level for a diagnostic severity.
    pub const fn level(severity: Severity) -> log::Level {
        match severity {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

impl DebugSink for LogSink {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, Self::level(severity), "{}", message);
    }
}

/// Discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn emit(&self, _severity: Severity, _message: fmt::Arguments<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_to_log_levels() {
        assert_eq!(LogSink::level(Severity::Debug), log::Level::Debug);
        assert_eq!(LogSink::level(Severity::Info), log::Level::Info);
        assert_eq!(LogSink::level(Severity::Warning), log::Level::Warn);
        assert_eq!(LogSink::level(Severity::Error), log::Level::Error);
    }

    #[test]
    fn emitting_without_logger_is_harmless() {
        LogSink.error(format_args!("SPI Timeout"));
        NullSink.info(format_args!("motor loop"));
    }
}
