//! Deletes responses older than the retention period.

use chrono::{DateTime, Months, Timelike, Utc};
use std::sync::Arc;
use tracing::info;

use crate::storage::{StorageBackend, StorageError};

pub struct RetentionService {
    storage: Arc<dyn StorageBackend>,
    retention_months: u32,
}

impl RetentionService {
    pub fn new(storage: Arc<dyn StorageBackend>, retention_months: u32) -> Self {
        Self {
            storage,
            retention_months,
        }
    }

    /// `now` minus the retention period, with the hour set to midnight. Minutes and
    /// seconds are kept.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let shifted = now
            .checked_sub_months(Months::new(self.retention_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        shifted.with_hour(0).unwrap_or(shifted)
    }

    /// Delete every response with a timestamp before the cutoff.
    pub async fn purge(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let cutoff = self.cutoff(now);
        let count = self.storage.delete_responses_before(cutoff).await?;
        info!("Deleted {} FlowResponse(s)", count);
        Ok(count)
    }
}
