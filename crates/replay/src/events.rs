use std::collections::HashMap;

use azimuth_common::{
    H256,
    crypto::keccak_hash,
    types::{PointNumber, RawEvent, topic_as_u32},
};

use crate::errors::ReplayError;

/// Registry log kinds understood by the L1 resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum L1EventKind {
    Spawned,
    Activated,
    OwnerChanged,
    ChangedSpawnProxy,
    ChangedTransferProxy,
    ChangedManagementProxy,
    ChangedVotingProxy,
    EscapeRequested,
    EscapeCanceled,
    EscapeAccepted,
    LostSponsor,
    BrokeContinuity,
    ChangedKeys,
    ChangedDns,
}

impl L1EventKind {
    pub fn signature(&self) -> &'static str {
        match self {
            L1EventKind::Spawned => "Spawned(uint32,uint32)",
            L1EventKind::Activated => "Activated(uint32)",
            L1EventKind::OwnerChanged => "OwnerChanged(uint32,address)",
            L1EventKind::ChangedSpawnProxy => "ChangedSpawnProxy(uint32,address)",
            L1EventKind::ChangedTransferProxy => "ChangedTransferProxy(uint32,address)",
            L1EventKind::ChangedManagementProxy => "ChangedManagementProxy(uint32,address)",
            L1EventKind::ChangedVotingProxy => "ChangedVotingProxy(uint32,address)",
            L1EventKind::EscapeRequested => "EscapeRequested(uint32,uint32)",
            L1EventKind::EscapeCanceled => "EscapeCanceled(uint32,uint32)",
            L1EventKind::EscapeAccepted => "EscapeAccepted(uint32,uint32)",
            L1EventKind::LostSponsor => "LostSponsor(uint32,uint32)",
            L1EventKind::BrokeContinuity => "BrokeContinuity(uint32,uint32)",
            L1EventKind::ChangedKeys => "ChangedKeys(uint32,bytes32,bytes32,uint32,uint32)",
            L1EventKind::ChangedDns => "ChangedDns(string,string,string)",
        }
    }

    pub fn topic(&self) -> H256 {
        keccak_hash(self.signature())
    }

    /// Classifies a registry log by its first topic.
    pub fn classify(event: &RawEvent) -> Result<Self, ReplayError> {
        let topic = required_topic(event, 0)?;
        REGISTRY_TOPICS
            .get(topic)
            .copied()
            .ok_or(ReplayError::UnknownEventKind {
                event_id: event.id,
                topic: *topic,
            })
    }

    /// The point whose record the log mutates, if any.
    pub fn subject(&self, event: &RawEvent) -> Result<Option<PointNumber>, ReplayError> {
        match self {
            L1EventKind::ChangedDns => Ok(None),
            // Spawned(parent, child)
            L1EventKind::Spawned => Ok(Some(topic_as_u32(required_topic(event, 2)?))),
            _ => Ok(Some(topic_as_u32(required_topic(event, 1)?))),
        }
    }
}

lazy_static::lazy_static! {
    /// Topic of the rollup contract's `Batch()` log.
    pub static ref BATCH_TOPIC: H256 = keccak_hash("Batch()");

    static ref REGISTRY_TOPICS: HashMap<H256, L1EventKind> = {
        use strum::IntoEnumIterator;
        L1EventKind::iter().map(|kind| (kind.topic(), kind)).collect()
    };
}

pub(crate) fn required_topic(event: &RawEvent, index: usize) -> Result<&H256, ReplayError> {
    event.topic(index).ok_or(ReplayError::MissingTopic {
        event_id: event.id,
        index,
    })
}
