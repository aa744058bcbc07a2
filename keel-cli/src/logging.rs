//! Logging setup for the `keel` binary.
//!
//! Library crates only emit `tracing` events; this module installs the
//! subscriber, and only when asked to.
//!
//! # Environment Variables
//!
//! - `KEEL_DEBUG=1` (or `true`, `yes`) - Enable debug logging
//! - `KEEL_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `KEEL_LOG_FORMAT=compact|pretty|json` - Set output format (default: compact)

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event.
    Compact,
    /// Multi-line, human oriented.
    Pretty,
    /// Structured JSON.
    Json,
}

fn parse_debug(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn parse_level(value: Option<&str>, debug: bool) -> &'static str {
    match value.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ if debug => "debug",
        _ => "warn",
    }
}

fn parse_format(value: Option<&str>) -> LogFormat {
    match value.map(str::to_lowercase).as_deref() {
        Some("pretty") => LogFormat::Pretty,
        Some("json") => LogFormat::Json,
        _ => LogFormat::Compact,
    }
}

/// Check if debug logging is enabled via `KEEL_DEBUG`.
pub fn is_debug_enabled() -> bool {
    parse_debug(env::var("KEEL_DEBUG").ok().as_deref())
}

/// The configured log level from `KEEL_LOG_LEVEL`.
///
/// Defaults to "debug" if `KEEL_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    parse_level(env::var("KEEL_LOG_LEVEL").ok().as_deref(), is_debug_enabled())
}

/// The configured log format from `KEEL_LOG_FORMAT`.
pub fn get_log_format() -> LogFormat {
    parse_format(env::var("KEEL_LOG_FORMAT").ok().as_deref())
}

/// Install the tracing subscriber.
///
/// Does nothing unless `KEEL_DEBUG` or `KEEL_LOG_LEVEL` is set. Subsequent
/// calls are no-ops. Logs go to stderr so command output stays parseable.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("KEEL_LOG_LEVEL").is_err() {
            return;
        }

        let level = get_log_level();
        let filter = EnvFilter::try_new(format!(
            "keel_cli={level},keel_migrate={level},keel_sqlite={level}"
        ))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

        let registry = tracing_subscriber::registry().with(filter);
        let layer = fmt::layer().with_writer(std::io::stderr);
        match get_log_format() {
            LogFormat::Json => registry.with(layer.json()).init(),
            LogFormat::Pretty => registry.with(layer.pretty()).init(),
            LogFormat::Compact => registry.with(layer.compact()).init(),
        }

        tracing::debug!(level, format = ?get_log_format(), "Keel logging initialized");
    });
}
