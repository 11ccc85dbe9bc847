//! Process logger for calibration tools and tracking sessions.
//!
//! Lines look like `[  0.125s  INFO pupil_calib::record] message` on stderr.
//! Binaries install it once at startup, either with an explicit level or
//! from [`LOG_ENV`]; library code only uses the `log` macros.

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log level (`"debug"`) or, for
/// [`init_tracing`], a full `EnvFilter` directive.
pub const LOG_ENV: &str = "PUPIL_CALIB_LOG";

/// Level used when [`LOG_ENV`] is unset or unparsable.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

#[cfg(feature = "tracing")]
const DEFAULT_DIRECTIVE: &str = "pupil_calib=info,pupil_calib_core=info";

struct SessionLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn format_line(elapsed: f64, level: Level, target: &str, message: impl fmt::Display) -> String {
    format!("[{elapsed:7.3}s {level:>5} {target}] {message}\n")
}

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs; later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| SessionLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install the stderr logger at the level named by [`LOG_ENV`].
///
/// Returns the level that was requested.
pub fn init_from_env() -> Result<LevelFilter, log::SetLoggerError> {
    let level = level_from(std::env::var(LOG_ENV).ok().as_deref());
    init_with_level(level)?;
    Ok(level)
}

fn level_from(value: Option<&str>) -> LevelFilter {
    value.and_then(parse_level).unwrap_or(DEFAULT_LEVEL)
}

/// Parse a level name (`"off"`, `"error"`, ..., `"trace"`), case-insensitive.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse().ok()
}

/// Output format of [`init_tracing`].
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceFormat {
    /// Human-readable lines with an uptime timestamp.
    #[default]
    Text,
    /// One flattened JSON object per event, for session log files.
    Json,
}

/// Install a `tracing` subscriber on stderr; span close events carry the
/// time spent loading calibrations and correcting pupils.
///
/// The filter comes from [`LOG_ENV`], defaulting to `info` for both crates.
#[cfg(feature = "tracing")]
pub fn init_tracing(format: TraceFormat) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = match format {
        TraceFormat::Json => builder.json().flatten_event(true).finish().try_init(),
        TraceFormat::Text => builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("Debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" off "), Some(LevelFilter::Off));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn unset_or_unknown_env_uses_default_level() {
        assert_eq!(level_from(None), DEFAULT_LEVEL);
        assert_eq!(level_from(Some("verbose")), DEFAULT_LEVEL);
        assert_eq!(level_from(Some("trace")), LevelFilter::Trace);
    }

    #[test]
    fn line_carries_elapsed_level_and_target() {
        let line = format_line(0.125, Level::Info, "pupil_calib::record", "camera loaded");
        assert_eq!(line, "[  0.125s  INFO pupil_calib::record] camera loaded\n");
        let line = format_line(12.5, Level::Warn, "pupil_calib::record", "no map");
        assert!(line.starts_with("[ 12.500s  WARN "), "{line}");
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_with_level(LevelFilter::Warn).expect("first init");
        init_with_level(LevelFilter::Trace).expect("second init is a no-op");
        log::warn!("logger installed");
    }
}
