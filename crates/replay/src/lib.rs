pub mod codec;
pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod l1;
pub mod l2;
pub mod signature;
pub mod state;

pub use codec::{L2Action, L2Transaction, decode_batch};
pub use config::ReplayConfig;
pub use controller::{ReplayStats, Replayer};
pub use errors::ReplayError;
pub use l2::{L2Outcome, SkipReason};
pub use state::PointSet;
