use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::domain::DataRow;

pub const DEFAULT_DATA_LOG_PATH: &str = "./data/data.csv";

/// Appends one CSV row of telemetry per cycle.
///
/// The header row is written only when the file is new or empty.
#[derive(Debug, Clone)]
pub struct CsvDataLogger {
    path: PathBuf,
}

impl CsvDataLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, row: &DataRow) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open data log {}", self.path.display()))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        wtr.serialize(row).context("Failed to write data row")?;
        wtr.flush().context("Failed to flush data log")?;
        Ok(())
    }
}
