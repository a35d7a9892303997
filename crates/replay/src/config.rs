use azimuth_common::Address;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 500;
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;

/// Deployment parameters and paging limits for a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Contract emitting the L1 registry logs
    pub registry_address: Address,
    /// Contract whose `Batch()` logs carry rollup transactions
    pub rollup_address: Address,
    /// First block of the rollup; registry logs before it are replayed alone
    pub rollup_genesis_block: u64,
    /// Owner or spawn-proxy value that moves a point onto the rollup
    pub deposit_address: Address,
    /// Registry logs per atomic page before the rollup genesis
    pub page_size: u64,
    /// Logs per atomic page after the rollup genesis; `None` takes every
    /// remaining log in one pass.
    pub interleaved_page_size: Option<u64>,
    pub max_commit_retries: u32,
}

impl ReplayConfig {
    pub fn new(
        registry_address: Address,
        rollup_address: Address,
        rollup_genesis_block: u64,
        deposit_address: Address,
    ) -> Self {
        Self {
            registry_address,
            rollup_address,
            rollup_genesis_block,
            deposit_address,
            page_size: DEFAULT_PAGE_SIZE,
            interleaved_page_size: None,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }
}
