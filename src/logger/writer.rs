//! Log writer module
//!
//! Thread-safe writing of access and error logs to files or stdout/stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use super::LogLevel;

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    Stdout,
    Stderr,
    File(Mutex<File>),
}

/// Thread-safe log writer
pub struct LogWriter {
    access: LogTarget,
    error: LogTarget,
    level: LogLevel,
}

impl LogWriter {
    fn new(
        access_log_file: Option<&str>,
        error_log_file: Option<&str>,
        level: LogLevel,
    ) -> io::Result<Self> {
        let access = match access_log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stdout,
        };

        let error = match error_log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stderr,
        };

        Ok(Self {
            access,
            error,
            level,
        })
    }

    /// Write to access log
    pub fn write_access(&self, message: &str) {
        write_to_target(&self.access, message);
    }

    /// Write to error log
    pub fn write_error(&self, message: &str) {
        write_to_target(&self.error, message);
    }

    /// Write to error log if `level` is within the configured threshold
    pub fn log(&self, level: LogLevel, message: &str) {
        if level <= self.level {
            self.write_error(message);
        }
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

fn write_to_target(target: &LogTarget, message: &str) {
    match target {
        LogTarget::Stdout => println!("{message}"),
        LogTarget::Stderr => eprintln!("{message}"),
        LogTarget::File(file) => {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{message}");
            }
        }
    }
}

/// Initialize the global log writer
///
/// Returns error if log files cannot be opened or the writer is already set.
pub fn init(
    access_log_file: Option<&str>,
    error_log_file: Option<&str>,
    level: LogLevel,
) -> io::Result<()> {
    let writer = LogWriter::new(access_log_file, error_log_file, level)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if initialized
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_target_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("error.log");
        let path_str = path.to_str().unwrap();

        let writer = LogWriter::new(None, Some(path_str), LogLevel::Info).unwrap();
        writer.write_error("[ERROR] first");
        writer.write_error("[ERROR] second");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[ERROR] first\n[ERROR] second\n");
    }

    #[test]
    fn test_error_level_hides_warn_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");

        let writer = LogWriter::new(None, path.to_str(), LogLevel::Error).unwrap();
        writer.log(LogLevel::Warn, "[WARN] upstream slow");
        writer.log(LogLevel::Info, "[INFO] server started");
        writer.log(LogLevel::Error, "[ERROR] upstream down");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[ERROR] upstream down\n");
    }

    #[test]
    fn test_warn_level_hides_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");

        let writer = LogWriter::new(None, path.to_str(), LogLevel::Warn).unwrap();
        writer.log(LogLevel::Info, "[INFO] server started");
        writer.log(LogLevel::Debug, "[DEBUG] accepted");
        writer.log(LogLevel::Warn, "[WARN] missing parameters");
        writer.log(LogLevel::Error, "[ERROR] upstream down");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[WARN] missing parameters\n[ERROR] upstream down\n");
    }
}
