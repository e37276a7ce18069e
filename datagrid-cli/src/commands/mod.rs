pub mod check;
pub mod compile;
pub mod serve;

use anyhow::{Context, Result};
use datagrid_service::config::Config;
use figment::Figment;
use std::path::Path;

/// Service name used for the default configuration search path
pub const SERVICE_NAME: &str = "datagrid";

/// Load the service configuration and the raw sources holding the whitelists
pub fn load_sources(path: Option<&Path>) -> Result<(Config, Figment)> {
    let figment = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            Config::figment_from(path)
        }
        None => Config::figment_for_service(SERVICE_NAME),
    };

    let config: Config = figment
        .extract()
        .context("Failed to load configuration")?;

    Ok((config, figment))
}
