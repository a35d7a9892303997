mod api;
mod store;
mod store_db;

pub mod error;
pub use api::StoreEngine;
pub use store::{EngineType, EventFilter, Store, UpdateBatch};

#[cfg(feature = "sql")]
pub use store_db::sql::{MIGRATION_VERSION, SQLStore};
