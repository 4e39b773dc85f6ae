//! Logger module
//!
//! Provides logging utilities for the web server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging, filtered by `logging.level`
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use crate::error::ProxyError;

/// Severity threshold for the error log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Parse a level name; unknown names fall back to `Info`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "debug" | "trace" => Self::Debug,
            _ => Self::Info,
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
        LogLevel::parse(&config.logging.level),
    )
}

/// Write to error log, filtered by level
fn write_error(level: LogLevel, message: &str) {
    match writer::get() {
        Some(w) => w.log(level, message),
        // Before init, behave like the default `info` threshold
        None if level <= LogLevel::Info => eprintln!("{message}"),
        None => {}
    }
}

/// Write to access log
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(listen: &str, config: &Config) {
    log_info("======================================");
    log_info("SkySense server started");
    log_info(&format!("Listening on: {listen}"));
    if !config.base_path().is_empty() {
        log_info(&format!("Mounted under: {}", config.base_path()));
    }
    log_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        log_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        log_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        log_info(&format!("Error log: {path}"));
    }
    log_info(&format!(
        "Creek data upstream: {} (timeout {}s)",
        config.upstream.base_url, config.upstream.timeout_secs
    ));
    log_info("======================================");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_debug(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(LogLevel::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(LogLevel::Warn, &format!("[WARN] {message}"));
}

pub fn log_info(message: &str) {
    write_error(LogLevel::Info, &format!("[INFO] {message}"));
}

pub fn log_debug(message: &str) {
    write_error(LogLevel::Debug, &format!("[DEBUG] {message}"));
}

/// Record a failed creek-data request
pub fn log_proxy_failure(err: &ProxyError) {
    let message = format!("[creek-data] {} failure: {err}", err.kind());
    match err {
        ProxyError::Validation => log_warning(&message),
        _ => log_error(&message),
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("ERROR"), LogLevel::Error);
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info >= LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
    }
}
