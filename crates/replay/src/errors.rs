use azimuth_common::{Address, H256};
use azimuth_storage::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Replay failed due to a Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Event {event_id} has unknown registry topic {topic:#x}")]
    UnknownEventKind { event_id: u64, topic: H256 },
    #[error("Event {event_id} has a malformed payload: {reason}")]
    MalformedPayload { event_id: u64, reason: String },
    #[error("Event {event_id} is missing topic {index}")]
    MissingTopic { event_id: u64, index: usize },
    #[error("Event {event_id} from the rollup contract is not a batch (topic {topic:#x})")]
    UnexpectedRollupEvent { event_id: u64, topic: H256 },
    #[error("Event {event_id} was emitted by unknown contract {address:#x}")]
    UnknownContract { event_id: u64, address: Address },
    #[error("Batch event {event_id} has no call-data attached")]
    MissingCallData { event_id: u64 },
    #[error("Failed to commit page after {attempts} attempts: {source}")]
    CommitFailed {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}
