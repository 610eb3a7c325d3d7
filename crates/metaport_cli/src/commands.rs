pub mod config;
pub mod export;
pub mod import;
pub mod types;

use metaport_core::config::MetaportConfig;
use metaport_core::{AdminStore, HttpTransport, Result};

/// Admin API store for a configured environment
pub(crate) fn connect(config: &MetaportConfig, env: &str) -> Result<AdminStore<HttpTransport>> {
    let environment = config.environment(env)?;
    let transport = HttpTransport::for_environment(env, environment, config.retry.clone())?;
    Ok(AdminStore::new(transport).with_label(env))
}
