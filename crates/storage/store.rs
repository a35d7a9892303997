use std::{path::Path, sync::Arc};

use azimuth_common::{
    Address, Bytes,
    types::{AuditEntry, Diff, Point, PointNumber, RawEvent},
};
use tracing::info;

use crate::{api::StoreEngine, error::StoreError, store_db::in_memory::Store as InMemoryStore};
#[cfg(feature = "sql")]
use crate::store_db::sql::SQLStore;

#[derive(Debug, Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            engine: Arc::new(InMemoryStore::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    #[cfg(feature = "sql")]
    SQL,
}

/// Everything one replay page writes. Committed atomically.
#[derive(Debug, Default, Clone)]
pub struct UpdateBatch {
    /// Points to insert or overwrite, keyed by their number
    pub points: Vec<Point>,
    /// Audit entries to append, in order
    pub diffs: Vec<Diff>,
    /// Ids of raw events to flag as processed
    pub processed_events: Vec<u64>,
}

/// Selects unprocessed raw events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    /// Only events emitted by this contract
    pub contract: Option<Address>,
    /// Only events with a block number strictly below this one
    pub before_block: Option<u64>,
    pub limit: Option<u64>,
}

impl Store {
    pub fn new(path: &str, engine_type: EngineType) -> Result<Self, StoreError> {
        info!("Starting storage engine ({engine_type:?})");
        let store = match engine_type {
            #[cfg(feature = "sql")]
            EngineType::SQL => Self {
                engine: Arc::new(SQLStore::new(path)?),
            },
            EngineType::InMemory => Self {
                engine: Arc::new(InMemoryStore::new()),
            },
        };
        info!("Started store engine");
        Ok(store)
    }

    /// Wraps an engine built outside this crate.
    pub fn from_engine(engine: Arc<dyn StoreEngine>) -> Self {
        Self { engine }
    }

    pub async fn add_event(&self, event: RawEvent) -> Result<u64, StoreError> {
        self.engine.add_event(event).await
    }

    /// Back-fills the call-data of a rollup batch log.
    pub async fn set_event_data(
        &self,
        block_number: u64,
        log_index: u64,
        data: Bytes,
    ) -> Result<(), StoreError> {
        self.engine
            .set_event_data(block_number, log_index, data)
            .await
    }

    pub async fn get_event(&self, id: u64) -> Result<Option<RawEvent>, StoreError> {
        self.engine.get_event(id).await
    }

    pub async fn get_unprocessed_events(
        &self,
        filter: EventFilter,
    ) -> Result<Vec<RawEvent>, StoreError> {
        self.engine.get_unprocessed_events(filter).await
    }

    pub async fn get_point(&self, number: PointNumber) -> Result<Option<Point>, StoreError> {
        self.engine.get_point(number).await
    }

    pub async fn get_points(&self) -> Result<Vec<Point>, StoreError> {
        self.engine.get_points().await
    }

    pub async fn get_diffs_for_point(
        &self,
        number: PointNumber,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        self.engine.get_diffs_for_point(number).await
    }

    pub async fn apply_updates(&self, update_batch: UpdateBatch) -> Result<(), StoreError> {
        self.engine.apply_updates(update_batch).await
    }

    pub async fn checkpoint(&self, path: &Path) -> Result<(), StoreError> {
        info!(path = %path.display(), "Writing checkpoint");
        self.engine.checkpoint(path).await
    }
}
