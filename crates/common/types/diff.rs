use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

use super::PointNumber;
use crate::serde_utils;

/// Audit operation codes. The numeric values are persisted and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[repr(u8)]
pub enum DiffOperation {
    Spawned = 1,
    Activated = 2,
    ChangedOwner = 3,
    ChangedSpawnProxy = 4,
    ChangedTransferProxy = 5,
    ChangedManagementProxy = 6,
    ChangedVotingProxy = 7,
    EscapeRequested = 8,
    EscapeCanceled = 9,
    EscapeAccepted = 10,
    EscapeRejected = 11,
    LostSponsor = 12,
    Breached = 13,
    ResetKeys = 14,
    NewDominion = 15,
}

impl TryFrom<u8> for DiffOperation {
    type Error = DiffDataError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use DiffOperation::*;
        Ok(match value {
            1 => Spawned,
            2 => Activated,
            3 => ChangedOwner,
            4 => ChangedSpawnProxy,
            5 => ChangedTransferProxy,
            6 => ChangedManagementProxy,
            7 => ChangedVotingProxy,
            8 => EscapeRequested,
            9 => EscapeCanceled,
            10 => EscapeAccepted,
            11 => EscapeRejected,
            12 => LostSponsor,
            13 => Breached,
            14 => ResetKeys,
            15 => NewDominion,
            other => return Err(DiffDataError::UnknownOperation(other)),
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiffDataError {
    #[error("Unknown diff operation {0}")]
    UnknownOperation(u8),
    #[error("Diff payload has {actual} bytes, expected {expected}")]
    UnexpectedLength { expected: usize, actual: usize },
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub source_event_id: u64,
    /// 0 for L1 events; position of the sub-transaction for rollup batches.
    pub intra_batch_index: u64,
    pub point: PointNumber,
    pub operation: DiffOperation,
    #[serde(with = "serde_utils::bytes")]
    pub data: Bytes,
}

impl Diff {
    pub fn new(
        source_event_id: u64,
        intra_batch_index: u64,
        point: PointNumber,
        operation: DiffOperation,
    ) -> Self {
        Self {
            source_event_id,
            intra_batch_index,
            point,
            operation,
            data: Bytes::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_u32(self, value: u32) -> Self {
        self.with_data(value.to_be_bytes().to_vec())
    }

    pub fn with_address(self, address: Address) -> Self {
        self.with_data(address.as_bytes().to_vec())
    }

    /// Reads a big-endian integer of up to 4 bytes. An empty payload reads as 0.
    pub fn data_as_u32(&self) -> Result<u32, DiffDataError> {
        if self.data.len() > 4 {
            return Err(DiffDataError::UnexpectedLength {
                expected: 4,
                actual: self.data.len(),
            });
        }
        Ok(self
            .data
            .iter()
            .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)))
    }

    pub fn data_as_address(&self) -> Result<Address, DiffDataError> {
        if self.data.len() != 20 {
            return Err(DiffDataError::UnexpectedLength {
                expected: 20,
                actual: self.data.len(),
            });
        }
        Ok(Address::from_slice(&self.data))
    }

    /// Splits a configure-keys payload into (suite, auth key, encryption key).
    pub fn data_as_keys(&self) -> Result<(u32, H256, H256), DiffDataError> {
        if self.data.len() != 68 {
            return Err(DiffDataError::UnexpectedLength {
                expected: 68,
                actual: self.data.len(),
            });
        }
        let mut suite = [0u8; 4];
        suite.copy_from_slice(&self.data[..4]);
        Ok((
            u32::from_be_bytes(suite),
            H256::from_slice(&self.data[4..36]),
            H256::from_slice(&self.data[36..]),
        ))
    }
}

/// A stored diff joined with the chain log that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: u64,
    pub tx_hash: H256,
    pub contract_address: Address,
    #[serde(flatten)]
    pub diff: Diff,
}
