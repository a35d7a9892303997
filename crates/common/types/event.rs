use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::serde_utils;

/// One chain log as delivered by the ingestion side.
///
/// Accepts both the field names of an `eth_getLogs` response (`address`,
/// `transactionHash`) and the shorter `contractAddress` / `txHash` spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Assigned by the store on insertion.
    #[serde(default)]
    pub id: u64,
    #[serde(with = "serde_utils::u64::hex_or_dec")]
    pub block_number: u64,
    pub block_hash: H256,
    #[serde(rename = "transactionHash", alias = "txHash")]
    pub tx_hash: H256,
    #[serde(with = "serde_utils::u64::hex_or_dec")]
    pub log_index: u64,
    #[serde(rename = "address", alias = "contractAddress")]
    pub contract_address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "serde_utils::bytes", default)]
    pub data: Bytes,
    #[serde(default)]
    pub processed: bool,
}

impl RawEvent {
    pub fn topic(&self, index: usize) -> Option<&H256> {
        self.topics.get(index)
    }

    /// Position of this log in the chain; the replay order.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// An indexed `uint32` topic lives in the last 4 bytes of its word.
pub fn topic_as_u32(topic: &H256) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&topic.as_bytes()[28..]);
    u32::from_be_bytes(word)
}

/// An indexed `address` topic lives in the last 20 bytes of its word.
pub fn topic_as_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}
