use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use azimuth_common::{
    Bytes,
    types::{AuditEntry, Diff, Point, PointNumber, RawEvent},
};
use serde::Serialize;

use crate::{EventFilter, UpdateBatch, api::StoreEngine, error::StoreError};

#[derive(Default, Clone)]
pub struct Store(Arc<Mutex<StoreInner>>);

#[derive(Default, Debug, Serialize)]
struct StoreInner {
    /// Raw events by id; ids start at 1 and follow insertion order
    events: BTreeMap<u64, RawEvent>,
    /// Map of (block number, log index) to event id
    #[serde(skip)]
    event_ids_by_position: HashMap<(u64, u64), u64>,
    points: BTreeMap<PointNumber, Point>,
    /// Append-only; a diff's id is its position plus one
    diffs: Vec<Diff>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.0
            .lock()
            .map_err(|_| StoreError::Custom("Failed to lock the store".to_string()))
    }
}

#[async_trait::async_trait]
impl StoreEngine for Store {
    async fn add_event(&self, mut event: RawEvent) -> Result<u64, StoreError> {
        let mut store = self.inner()?;
        if let Some(id) = store.event_ids_by_position.get(&event.position()) {
            return Ok(*id);
        }
        let id = store.events.len() as u64 + 1;
        event.id = id;
        store.event_ids_by_position.insert(event.position(), id);
        store.events.insert(id, event);
        Ok(id)
    }

    async fn set_event_data(
        &self,
        block_number: u64,
        log_index: u64,
        data: Bytes,
    ) -> Result<(), StoreError> {
        let mut store = self.inner()?;
        let id = *store
            .event_ids_by_position
            .get(&(block_number, log_index))
            .ok_or(StoreError::EventNotFound {
                block_number,
                log_index,
            })?;
        let event = store.events.get_mut(&id).ok_or(StoreError::EventNotFound {
            block_number,
            log_index,
        })?;
        event.data = data;
        Ok(())
    }

    async fn get_event(&self, id: u64) -> Result<Option<RawEvent>, StoreError> {
        Ok(self.inner()?.events.get(&id).cloned())
    }

    async fn get_unprocessed_events(
        &self,
        filter: EventFilter,
    ) -> Result<Vec<RawEvent>, StoreError> {
        let store = self.inner()?;
        let mut events: Vec<RawEvent> = store
            .events
            .values()
            .filter(|event| !event.processed)
            .filter(|event| {
                filter
                    .contract
                    .is_none_or(|contract| event.contract_address == contract)
            })
            .filter(|event| {
                filter
                    .before_block
                    .is_none_or(|block| event.block_number < block)
            })
            .cloned()
            .collect();
        events.sort_by_key(RawEvent::position);
        if let Some(limit) = filter.limit {
            events.truncate(usize::try_from(limit)?);
        }
        Ok(events)
    }

    async fn get_point(&self, number: PointNumber) -> Result<Option<Point>, StoreError> {
        Ok(self.inner()?.points.get(&number).cloned())
    }

    async fn get_points(&self) -> Result<Vec<Point>, StoreError> {
        Ok(self.inner()?.points.values().cloned().collect())
    }

    async fn get_diffs_for_point(
        &self,
        number: PointNumber,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let store = self.inner()?;
        let mut entries = Vec::new();
        for (index, diff) in store.diffs.iter().enumerate() {
            if diff.point != number {
                continue;
            }
            let source = store.events.get(&diff.source_event_id);
            entries.push(AuditEntry {
                id: index as u64 + 1,
                tx_hash: source.map(|event| event.tx_hash).unwrap_or_default(),
                contract_address: source
                    .map(|event| event.contract_address)
                    .unwrap_or_default(),
                diff: diff.clone(),
            });
        }
        Ok(entries)
    }

    async fn apply_updates(&self, update_batch: UpdateBatch) -> Result<(), StoreError> {
        let mut store = self.inner()?;
        // Validate first so a missing event leaves the store untouched
        for id in &update_batch.processed_events {
            if !store.events.contains_key(id) {
                return Err(StoreError::Custom(format!("Unknown event id {id}")));
            }
        }
        for point in update_batch.points {
            store.points.insert(point.number, point);
        }
        store.diffs.extend(update_batch.diffs);
        for id in update_batch.processed_events {
            if let Some(event) = store.events.get_mut(&id) {
                event.processed = true;
            }
        }
        Ok(())
    }

    async fn checkpoint(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = serde_json::to_vec_pretty(&*self.inner()?)?;
        tokio::fs::write(path, snapshot).await?;
        Ok(())
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("In Memory Store").finish()
    }
}
