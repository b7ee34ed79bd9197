//! `RegistrationSink`: the single async interface for persisting
//! registrations.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::registration::{RegistrationRecord, StoredRegistration};

use super::stats::RegistrationStats;

/// Somewhere confirmed registrations are written.
#[async_trait]
pub trait RegistrationSink: Send + Sync {
    /// Sink name for logs.
    fn name(&self) -> &str;

    /// Append one record, stamping it with the write time.
    ///
    /// Called exactly once per confirmed registration.
    async fn append(&self, record: &RegistrationRecord) -> Result<StoredRegistration, StorageError>;

    /// Count stored registrations by period.
    async fn stats(&self) -> Result<RegistrationStats, StorageError>;
}
