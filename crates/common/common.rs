pub use ethereum_types::{Address, H256};
pub mod crypto;
pub mod serde_utils;
pub mod types;
pub use bytes::Bytes;
