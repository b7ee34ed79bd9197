//! Local CSV file sink: the fallback when the spreadsheet is unavailable.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::registration::{RegistrationRecord, StoredRegistration};

use super::stats::RegistrationStats;
use super::traits::RegistrationSink;

/// Column names written on the first line of a new file.
pub const CSV_HEADER: [&str; 8] = [
    "registration_date",
    "name",
    "age",
    "phone",
    "telegram_username",
    "telegram_id",
    "status",
    "comments",
];

/// Status given to every freshly written registration.
pub const NEW_STATUS: &str = "New";

/// Appends registrations to a CSV file.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    // Serializes appends so the header is written once and rows never interleave.
    write_lock: Mutex<()>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RegistrationSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn append(&self, record: &RegistrationRecord) -> Result<StoredRegistration, StorageError> {
        let _guard = self.write_lock.lock().await;
        let stored = StoredRegistration::stamp_now(record.clone());
        let path = self.path.clone();
        let row = stored.clone();

        tokio::task::spawn_blocking(move || write_row(&path, &row))
            .await
            .map_err(|_| StorageError::Panicked {
                sink: "csv".into(),
            })??;

        info!(
            path = %self.path.display(),
            user_id = %stored.record.user_id,
            "Registration written to CSV"
        );
        Ok(stored)
    }

    async fn stats(&self) -> Result<RegistrationStats, StorageError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_stats(&path))
            .await
            .map_err(|_| StorageError::Panicked {
                sink: "csv".into(),
            })?
    }
}

fn write_row(path: &Path, stored: &StoredRegistration) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);

    if is_new {
        debug!(path = %path.display(), "Writing CSV header");
        writer.write_record(CSV_HEADER)?;
    }

    let record = &stored.record;
    writer.write_record([
        stored.registered_at_display().as_str(),
        record.name.as_str(),
        record.age.to_string().as_str(),
        record.phone.as_str(),
        record.username.as_str(),
        record.user_id.as_str(),
        NEW_STATUS,
        "",
    ])?;
    writer.flush()?;
    Ok(())
}

fn read_stats(path: &Path) -> Result<RegistrationStats, StorageError> {
    let today = Local::now().date_naive();
    if !path.exists() {
        return Ok(RegistrationStats::default());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let Some(column) = reader.headers()?.iter().position(|h| h == CSV_HEADER[0]) else {
        return Ok(RegistrationStats::default());
    };

    let timestamps: Vec<String> = reader
        .records()
        .filter_map(Result::ok)
        .filter_map(|row| row.get(column).map(str::to_string))
        .collect();

    Ok(RegistrationStats::from_timestamps(
        timestamps.iter().map(String::as_str),
        today,
    ))
}
