use azimuth_storage::{EngineType, Store};
use tracing_subscriber::{EnvFilter, Registry, filter::Directive, fmt, layer::SubscriberExt};

use crate::cli::Options;

pub const IN_MEMORY_DATADIR: &str = "memory";

pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let subscriber = Registry::default().with(log_filter).with(fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

pub fn init_store(datadir: &str) -> eyre::Result<Store> {
    let engine_type = if datadir == IN_MEMORY_DATADIR {
        EngineType::InMemory
    } else {
        EngineType::SQL
    };
    Ok(Store::new(datadir, engine_type)?)
}
