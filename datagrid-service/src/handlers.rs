//! HTTP handlers for grid endpoints
//!
//! | Method | Path | Parameters |
//! |---|---|---|
//! | `GET` | `/{resource}/{operation}/data` | query string |
//! | `POST` | `/{resource}/{operation}/data` | `application/x-www-form-urlencoded` body |
//! | `GET` | `/{resource}/{operation}/config` | none |
//!
//! Unknown endpoints are configuration errors (500), not 404s: a grid page
//! only exists for endpoints someone configured.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Form, Json, Router,
};
use serde::Serialize;

use crate::{
    error::Result,
    health::{health, readiness},
    intent::QueryIntent,
    params::ParamSource,
    response::DataTablesResponse,
    state::AppState,
    whitelist::{ColumnSpec, EndpointId},
};

/// Client-facing description of one grid
///
/// Lets the page build its columns without hard-coding them. Server-only
/// column flags are not part of it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfiguration {
    /// URL the grid should fetch rows from
    pub endpoint: String,
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
}

/// Routes for every configured grid plus health probes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/{resource}/{operation}/data",
            get(query_data).post(form_data),
        )
        .route("/{resource}/{operation}/config", get(table_config))
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Rows for a `GET` request
pub async fn query_data(
    State(state): State<AppState>,
    Path((resource, operation)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<DataTablesResponse> {
    serve_rows(&state, &resource, &operation, &params).await
}

/// Rows for a form `POST`
pub async fn form_data(
    State(state): State<AppState>,
    Path((resource, operation)): Path<(String, String)>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<DataTablesResponse> {
    serve_rows(&state, &resource, &operation, &params).await
}

/// Column configuration for the grid page
pub async fn table_config(
    State(state): State<AppState>,
    Path((resource, operation)): Path<(String, String)>,
) -> Result<Json<TableConfiguration>> {
    let endpoint = EndpointId::new(&resource, &operation)?;
    let whitelist = state.whitelists().resolve(&endpoint)?;

    Ok(Json(TableConfiguration {
        endpoint: endpoint.data_path(),
        table_name: whitelist.table_name().to_string(),
        columns: whitelist.columns().to_vec(),
    }))
}

async fn serve_rows<P: ParamSource + ?Sized>(
    state: &AppState,
    resource: &str,
    operation: &str,
    params: &P,
) -> Result<DataTablesResponse> {
    let endpoint = EndpointId::new(resource, operation)?;
    let whitelist = state.whitelists().resolve(&endpoint)?;
    let intent = QueryIntent::parse(params, &whitelist);
    state.executor().execute(&intent).await
}
