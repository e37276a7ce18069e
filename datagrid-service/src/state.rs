//! Application state management

use figment::Figment;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{
    config::Config,
    error::Result,
    executor::QueryExecutor,
    whitelist::{CachedWhitelistSource, FigmentWhitelistSource, WhitelistSource},
};

/// Application state shared across handlers
///
/// Everything is behind `Arc` or is itself a handle, so cloning per request
/// is cheap. Nothing in here is mutated by request handling.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    whitelists: Arc<dyn WhitelistSource>,
}

impl AppState {
    /// Assemble state from ready-made parts
    pub fn new(config: Config, pool: SqlitePool, whitelists: Arc<dyn WhitelistSource>) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            whitelists,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the whitelist source
    pub fn whitelists(&self) -> &dyn WhitelistSource {
        self.whitelists.as_ref()
    }

    /// Executor bound to this state's pool
    pub fn executor(&self) -> QueryExecutor<SqlitePool> {
        QueryExecutor::new(self.pool.clone())
    }
}

/// Builder for [`AppState`]
///
/// Anything not provided explicitly is derived from the configuration: the
/// pool is created from `[database]`, and whitelists are read from the
/// `datatables` section of the configuration sources behind a cache.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    figment: Option<Figment>,
    pool: Option<SqlitePool>,
    whitelists: Option<Arc<dyn WhitelistSource>>,
}

impl AppStateBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Configuration sources that hold the `datatables` section
    pub fn figment(mut self, figment: Figment) -> Self {
        self.figment = Some(figment);
        self
    }

    /// Use an existing database pool
    pub fn pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use a custom whitelist source
    pub fn whitelists(mut self, whitelists: impl WhitelistSource + 'static) -> Self {
        self.whitelists = Some(Arc::new(whitelists));
        self
    }

    /// Build the state, connecting to the database if no pool was given
    pub async fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();

        let pool = match self.pool {
            Some(pool) => pool,
            None => crate::database::create_pool(&config.database).await?,
        };

        let whitelists = match self.whitelists {
            Some(whitelists) => whitelists,
            None => {
                let figment = self
                    .figment
                    .unwrap_or_else(|| Config::figment_for_service(&config.service.name));
                let source = FigmentWhitelistSource::new(figment);
                Arc::new(CachedWhitelistSource::new(source)) as Arc<dyn WhitelistSource>
            }
        };

        Ok(AppState::new(config, pool, whitelists))
    }
}
