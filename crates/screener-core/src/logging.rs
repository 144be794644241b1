//! Logging setup with indicatif integration

use indicatif::MultiProgress;

/// Default verbosity chosen from CLI flags; `RUST_LOG` still wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Debug,
}

impl LogLevel {
    /// `debug` beats `quiet` when both are set.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if debug {
            Self::Debug
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Debug => "debug",
        }
    }
}

/// Padded label and optional ANSI color for a log level.
fn level_tag(level: log::Level, color: bool) -> String {
    let (label, ansi) = match level {
        log::Level::Error => ("ERROR", "\x1b[31m"),
        log::Level::Warn => ("WARN ", "\x1b[33m"),
        log::Level::Info => ("INFO ", "\x1b[32m"),
        log::Level::Debug => ("DEBUG", "\x1b[36m"),
        log::Level::Trace => ("TRACE", "\x1b[35m"),
    };
    if color {
        format!("[{ansi}{label}\x1b[0m]")
    } else {
        format!("[{label}]")
    }
}

/// Logger that prints through indicatif MultiProgress to avoid tearing stage bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        let line = format!("{} {}", level_tag(record.level(), true), record.args());
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging; pass `multi` in TTY mode so logs go above the bars.
pub fn init_logging(level: LogLevel, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let env = env_logger::Env::default().default_filter_or(level.filter());

    if let Some(multi) = multi {
        let logger = env_logger::Builder::from_env(env).build();
        let max_level = logger.filter();

        if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok() {
            log::set_max_level(max_level);
        }
    } else {
        // Non-TTY: no colors, millisecond timestamps for log aggregation
        let _ = env_logger::Builder::from_env(env)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} {}",
                    buf.timestamp_millis(),
                    level_tag(record.level(), false),
                    record.args()
                )
            })
            .try_init();
    }
}

/// Log a banner marking the start of a pipeline phase.
pub fn log_section(title: &str) {
    let rule = "=".repeat(60);
    log::info!("{rule}");
    log::info!("  {}", title.to_uppercase());
    log::info!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_wins() {
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Quiet);
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Normal);
    }

    #[test]
    fn plain_tag_has_no_escape_codes() {
        assert_eq!(level_tag(log::Level::Warn, false), "[WARN ]");
        assert!(level_tag(log::Level::Error, true).contains("\x1b[31m"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(LogLevel::Quiet, None);
        init_logging(LogLevel::Debug, None);
        log_section("scoring");
    }
}
