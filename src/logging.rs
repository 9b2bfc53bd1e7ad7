//! Console logger for the `log` facade
//!
//! Messages go to stderr with a colored level label so they stay apart from
//! the REPL's own output on stdout.

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::str::FromStr;

/// Environment variable that overrides the configured level
pub const LOG_ENV: &str = "PULSAR_LOG";

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{} {}", label(record.level()), record.args());
        }
    }

    fn flush(&self) {}
}

fn label(level: Level) -> ColoredString {
    match level {
        Level::Error => "[error]".bright_red().bold(),
        Level::Warn => "[warn]".yellow().bold(),
        Level::Info => "[info]".bright_cyan(),
        Level::Debug => "[debug]".dimmed(),
        Level::Trace => "[trace]".dimmed(),
    }
}

/// Resolve the level from `PULSAR_LOG`, then the configured name, then `info`
pub fn resolve_level(configured: &str) -> LevelFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .or_else(|| LevelFilter::from_str(configured.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the console logger. Calling it again only updates the level.
pub fn init(level: LevelFilter) {
    // A second set_logger fails; the installed logger is the same one
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_level_names() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        assert_eq!(resolve_level("debug"), LevelFilter::Debug);
        assert_eq!(resolve_level("WARN"), LevelFilter::Warn);
        assert_eq!(resolve_level("off"), LevelFilter::Off);
        assert_eq!(resolve_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(LevelFilter::Warn);
        init(LevelFilter::Debug);
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
