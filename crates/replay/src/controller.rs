use std::ops::AddAssign;

use azimuth_common::types::{PointNumber, RawEvent};
use azimuth_storage::{EventFilter, Store, UpdateBatch};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    codec::decode_batch,
    config::ReplayConfig,
    errors::ReplayError,
    events::{BATCH_TOPIC, L1EventKind, required_topic},
    l1::resolve_l1_event,
    l2::{L2Outcome, process_transaction},
    state::PointSet,
};

/// Counters for one replay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub l1_events_applied: u64,
    pub batches_applied: u64,
    pub l2_transactions_applied: u64,
    pub l2_transactions_skipped: u64,
    pub diffs_written: u64,
    pub pages_committed: u64,
}

impl AddAssign for ReplayStats {
    fn add_assign(&mut self, other: Self) {
        self.l1_events_applied += other.l1_events_applied;
        self.batches_applied += other.batches_applied;
        self.l2_transactions_applied += other.l2_transactions_applied;
        self.l2_transactions_skipped += other.l2_transactions_skipped;
        self.diffs_written += other.diffs_written;
        self.pages_committed += other.pages_committed;
    }
}

/// Drives stored events through the resolvers, page by page.
///
/// Registry logs from before the rollup genesis are replayed first, on their
/// own. Everything after that is replayed in chain order across both
/// contracts, since rollup transactions may depend on proxies set on L1 and
/// the other way around.
#[derive(Debug, Clone)]
pub struct Replayer {
    store: Store,
    config: ReplayConfig,
}

enum Source {
    Registry,
    Rollup,
}

impl Replayer {
    pub fn new(store: Store, config: ReplayConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replays every unprocessed event. Calling it again once it returns only
    /// picks up events ingested since.
    pub async fn run(&self) -> Result<ReplayStats, ReplayError> {
        let mut stats = self.replay_pre_genesis().await?;
        stats += self.replay_interleaved().await?;
        info!(
            l1_events = stats.l1_events_applied,
            batches = stats.batches_applied,
            l2_applied = stats.l2_transactions_applied,
            l2_skipped = stats.l2_transactions_skipped,
            diffs = stats.diffs_written,
            "Replay finished"
        );
        Ok(stats)
    }

    /// Replays registry logs older than the rollup genesis block.
    pub async fn replay_pre_genesis(&self) -> Result<ReplayStats, ReplayError> {
        info!(
            "Replaying registry events before rollup genesis block {}",
            self.config.rollup_genesis_block
        );
        let filter = EventFilter {
            contract: Some(self.config.registry_address),
            before_block: Some(self.config.rollup_genesis_block),
            limit: Some(self.config.page_size),
        };
        self.replay_pages(filter).await
    }

    /// Replays the remaining logs of both contracts in chain order.
    pub async fn replay_interleaved(&self) -> Result<ReplayStats, ReplayError> {
        info!("Replaying registry and rollup events in chain order");
        let filter = EventFilter {
            limit: self.config.interleaved_page_size,
            ..Default::default()
        };
        self.replay_pages(filter).await
    }

    async fn replay_pages(&self, filter: EventFilter) -> Result<ReplayStats, ReplayError> {
        let mut stats = ReplayStats::default();
        loop {
            let events = self.store.get_unprocessed_events(filter).await?;
            if events.is_empty() {
                return Ok(stats);
            }
            let (update, page_stats) = self.resolve_page(&events).await?;
            self.commit(update).await?;
            stats += page_stats;
            stats.pages_committed += 1;
            debug!(
                "Committed page of {} events ending at block {}",
                events.len(),
                events.last().map(|event| event.block_number).unwrap_or_default()
            );
        }
    }

    /// Resolves a page of events into one set of writes.
    async fn resolve_page(
        &self,
        events: &[RawEvent],
    ) -> Result<(UpdateBatch, ReplayStats), ReplayError> {
        let mut points = PointSet::new();
        let mut update = UpdateBatch::default();
        let mut stats = ReplayStats::default();

        for event in events {
            match self.source_of(event)? {
                Source::Registry => {
                    let kind = L1EventKind::classify(event)?;
                    let subject = kind.subject(event)?;
                    self.load(&mut points, subject).await?;
                    let current = subject.and_then(|number| points.get(number));
                    let effect =
                        resolve_l1_event(event, kind, current, self.config.deposit_address)?;
                    if let Some(point) = effect.point {
                        points.insert(point);
                    }
                    update.diffs.extend(effect.diff);
                    stats.l1_events_applied += 1;
                }
                Source::Rollup => {
                    let topic = required_topic(event, 0)?;
                    if *topic != *BATCH_TOPIC {
                        return Err(ReplayError::UnexpectedRollupEvent {
                            event_id: event.id,
                            topic: *topic,
                        });
                    }
                    if event.data.is_empty() {
                        return Err(ReplayError::MissingCallData { event_id: event.id });
                    }
                    let transactions = decode_batch(&event.data);
                    self.load(
                        &mut points,
                        transactions.iter().flat_map(|tx| tx.referenced_points()),
                    )
                    .await?;
                    for tx in &transactions {
                        match process_transaction(tx, event.id, &mut points) {
                            L2Outcome::Applied(diffs) => {
                                update.diffs.extend(diffs);
                                stats.l2_transactions_applied += 1;
                            }
                            L2Outcome::Skipped(reason) => {
                                warn!(
                                    event_id = event.id,
                                    index = tx.intra_batch_index,
                                    point = tx.source,
                                    action = tx.action.name(),
                                    "Skipping rollup transaction: {reason}"
                                );
                                stats.l2_transactions_skipped += 1;
                            }
                        }
                    }
                    stats.batches_applied += 1;
                }
            }
            update.processed_events.push(event.id);
        }

        stats.diffs_written = update.diffs.len() as u64;
        update.points = points.into_dirty();
        Ok((update, stats))
    }

    fn source_of(&self, event: &RawEvent) -> Result<Source, ReplayError> {
        if event.contract_address == self.config.registry_address {
            Ok(Source::Registry)
        } else if event.contract_address == self.config.rollup_address {
            Ok(Source::Rollup)
        } else {
            Err(ReplayError::UnknownContract {
                event_id: event.id,
                address: event.contract_address,
            })
        }
    }

    /// Reads the stored state of every point in `numbers` not yet in `points`.
    async fn load(
        &self,
        points: &mut PointSet,
        numbers: impl IntoIterator<Item = PointNumber>,
    ) -> Result<(), ReplayError> {
        for number in numbers {
            if points.is_loaded(number) {
                continue;
            }
            let stored = self.store.get_point(number).await?;
            points.preload(number, stored);
        }
        Ok(())
    }

    /// Commits a page, retrying the whole write on failure. A failed write
    /// leaves the store as it was, so the same batch is simply sent again.
    async fn commit(&self, update: UpdateBatch) -> Result<(), ReplayError> {
        let attempts = self.config.max_commit_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.store.apply_updates(update.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!("Commit attempt {attempt}/{attempts} failed, retrying: {err}");
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ReplayError::CommitFailed {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}
