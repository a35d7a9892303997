use std::{fmt::Debug, panic::RefUnwindSafe, path::Path};

use azimuth_common::{
    Bytes,
    types::{AuditEntry, Point, PointNumber, RawEvent},
};

use crate::{EventFilter, UpdateBatch, error::StoreError};

// We need async_trait because the stabilized feature lacks support for object safety
// (i.e. dyn StoreEngine)
#[async_trait::async_trait]
pub trait StoreEngine: Debug + Send + Sync + RefUnwindSafe {
    /// Adds a raw chain log and returns its id.
    /// Logs are unique by (block number, log index); adding a known one
    /// returns the existing id and leaves the row untouched.
    async fn add_event(&self, event: RawEvent) -> Result<u64, StoreError>;

    /// Attaches call-data to an already ingested log.
    async fn set_event_data(
        &self,
        block_number: u64,
        log_index: u64,
        data: Bytes,
    ) -> Result<(), StoreError>;

    async fn get_event(&self, id: u64) -> Result<Option<RawEvent>, StoreError>;

    /// Unprocessed logs matching `filter`, ordered by (block number, log index).
    async fn get_unprocessed_events(&self, filter: EventFilter)
    -> Result<Vec<RawEvent>, StoreError>;

    async fn get_point(&self, number: PointNumber) -> Result<Option<Point>, StoreError>;

    /// All points ordered by number.
    async fn get_points(&self) -> Result<Vec<Point>, StoreError>;

    /// Audit entries for a point in the order they were written.
    async fn get_diffs_for_point(
        &self,
        number: PointNumber,
    ) -> Result<Vec<AuditEntry>, StoreError>;

    /// Writes points, appends diffs and flags events processed, all or nothing.
    async fn apply_updates(&self, update_batch: UpdateBatch) -> Result<(), StoreError>;

    /// Writes a consistent copy of the whole store to `path`.
    async fn checkpoint(&self, path: &Path) -> Result<(), StoreError>;
}
