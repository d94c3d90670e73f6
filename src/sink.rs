use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::TrackerError;
use crate::models::MovementRecord;

pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "tripId",
    "line",
    "direction",
    "latitude",
    "longitude",
    "heading",
    "speed",
];

/// Append-only CSV log of tracked movements
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and a header-only file if the file is missing.
    /// An existing file is left untouched.
    pub fn ensure_initialized(&self) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TrackerError::filesystem(parent, e))?;
        }

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %self.path.display(), "CSV file already exists");
                return Ok(());
            }
            Err(e) => return Err(TrackerError::filesystem(&self.path, e)),
        };

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer
            .flush()
            .map_err(|e| TrackerError::filesystem(&self.path, e))?;

        tracing::info!(path = %self.path.display(), "Created CSV file");
        Ok(())
    }

    /// Append one row per record, all stamped with the same capture time
    pub fn append_rows(
        &self,
        records: &[MovementRecord],
        timestamp: DateTime<Utc>,
    ) -> Result<usize, TrackerError> {
        if records.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| TrackerError::filesystem(&self.path, e))?;

        let stamp = format_timestamp(timestamp);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for record in records {
            writer.write_record(row_fields(&stamp, record))?;
        }
        writer
            .flush()
            .map_err(|e| TrackerError::filesystem(&self.path, e))?;

        tracing::debug!(count = records.len(), path = %self.path.display(), "Appended rows");
        Ok(records.len())
    }
}

/// ISO-8601 UTC, e.g. `2024-05-01T12:30:00.000000Z`
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_fields(stamp: &str, record: &MovementRecord) -> [String; 8] {
    fn text(v: &Option<String>) -> String {
        v.clone().unwrap_or_default()
    }
    fn number(v: Option<f64>) -> String {
        v.map(|n| n.to_string()).unwrap_or_default()
    }

    [
        stamp.to_string(),
        text(&record.trip_id),
        text(&record.line),
        text(&record.direction),
        number(record.latitude),
        number(record.longitude),
        number(record.heading),
        number(record.speed),
    ]
}
