use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{EventLogger, Severity};

/// Appends messages to a log file, with ERROR messages routed to a separate file.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    error_path: PathBuf,
    include_timestamp: bool,
    lock: Mutex<()>,
}

impl FileLogger {
    /// When `error_path` is `None`, errors go to the main log file.
    pub fn new(path: impl Into<PathBuf>, error_path: Option<PathBuf>) -> Self {
        let path = path.into();
        Self {
            error_path: error_path.unwrap_or_else(|| path.clone()),
            path,
            include_timestamp: true,
            lock: Mutex::new(()),
        }
    }

    pub fn without_timestamp(mut self) -> Self {
        self.include_timestamp = false;
        self
    }

    fn append(&self, path: &Path, line: &str) -> io::Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")
    }
}

impl EventLogger for FileLogger {
    fn log(&self, message: &str, severity: Severity) {
        let path = if severity == Severity::Error {
            &self.error_path
        } else {
            &self.path
        };
        let line = if self.include_timestamp {
            format!("{}: [{severity}] {message}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        } else {
            message.to_string()
        };

        if let Err(e) = self.append(path, &line) {
            tracing::warn!(error = %e, path = %path.display(), "failed to append log line");
        }
    }
}
