//! # datagrid-service
//!
//! Server-side processing for DataTables-style grids: a client asks for a
//! page of rows with per-column and global search and a multi-column sort,
//! and the service answers with the page plus total and filtered counts.
//!
//! Every request flows through the same pipeline:
//!
//! 1. [`whitelist`]: the endpoint's [`ColumnWhitelist`](whitelist::ColumnWhitelist)
//!    is resolved from configuration.
//! 2. [`intent`]: the flat request parameters are parsed into a validated
//!    [`QueryIntent`](intent::QueryIntent). Only whitelisted columns survive.
//! 3. [`compiler`]: the intent becomes three parameterized statements (total
//!    count, filtered count, page select).
//! 4. [`executor`]: the statements run on one pooled connection and the
//!    rows come back as a [`DataTablesResponse`](response::DataTablesResponse).
//!
//! ## Example
//!
//! ```rust,no_run
//! use datagrid_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppStateBuilder::new()
//!         .config(config.clone())
//!         .build()
//!         .await?;
//!
//!     Server::new(config).serve(router(state)).await
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod health;
pub mod intent;
pub mod middleware;
pub mod observability;
pub mod params;
pub mod response;
pub mod server;
pub mod state;
pub mod whitelist;

pub mod prelude {
    pub use crate::compiler::{
        CompiledQuery, CompiledStatements, Dialect, Postgres, QueryCompiler, SqlParam, Sqlite,
    };
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::executor::{ConnectionProvider, QueryExecutor};
    pub use crate::handlers::router;
    pub use crate::health::{health, readiness};
    pub use crate::intent::{ColumnIntent, ParseMode, QueryIntent, SortDirection};
    pub use crate::observability::init_tracing;
    pub use crate::params::ParamSource;
    pub use crate::response::DataTablesResponse;
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::whitelist::{
        CachedWhitelistSource, ColumnSpec, ColumnWhitelist, EndpointId, FigmentWhitelistSource,
        WhitelistSource,
    };

    pub use axum::Router;
}
