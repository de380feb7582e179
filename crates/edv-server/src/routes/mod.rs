//! HTTP route handlers for the EDV API.
//!
//! - `POST /data-vaults`: create a vault
//! - `POST /encrypted-data-vaults/{vault_id}/docs`: store a document
//! - `GET  /encrypted-data-vaults/{vault_id}/docs/{doc_id}`: retrieve a document
//! - `GET  /healthz`: liveness probe

pub mod vaults;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

/// Build the application router with every route and the shared state bound.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(vaults::router())
        .route("/healthz", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
