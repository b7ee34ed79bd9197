//! Primary sink with a local fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StorageError;
use crate::registration::{RegistrationRecord, StoredRegistration};

use super::stats::RegistrationStats;
use super::traits::RegistrationSink;

/// Writes to `primary` when it is configured and working, otherwise to
/// `fallback`. There is exactly one fallback attempt and no retries.
pub struct FallbackSink {
    primary: Option<Arc<dyn RegistrationSink>>,
    fallback: Arc<dyn RegistrationSink>,
}

impl FallbackSink {
    pub fn new(primary: Option<Arc<dyn RegistrationSink>>, fallback: Arc<dyn RegistrationSink>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl RegistrationSink for FallbackSink {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn append(&self, record: &RegistrationRecord) -> Result<StoredRegistration, StorageError> {
        if let Some(primary) = &self.primary {
            match primary.append(record).await {
                Ok(stored) => return Ok(stored),
                Err(e) => warn!(
                    primary = primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Primary sink failed, writing registration to fallback"
                ),
            }
        }
        self.fallback.append(record).await
    }

    async fn stats(&self) -> Result<RegistrationStats, StorageError> {
        if let Some(primary) = &self.primary {
            match primary.stats().await {
                Ok(stats) => return Ok(stats),
                Err(e) => warn!(
                    primary = primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Primary sink failed, reading stats from fallback"
                ),
            }
        }
        self.fallback.stats().await
    }
}
