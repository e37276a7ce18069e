use anyhow::Result;
use datagrid_service::prelude::*;
use std::path::PathBuf;

use super::load_sources;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, figment) = load_sources(config_path.as_deref())?;

    init_tracing(&config)?;

    let state = AppStateBuilder::new()
        .config(config.clone())
        .figment(figment)
        .build()
        .await?;

    Server::new(config).serve(router(state)).await?;
    Ok(())
}
