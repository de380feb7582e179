//! Vault and document routes.
//!
//! Handlers decode the request, call the vault collection, and translate the
//! outcome. Created resources are answered with `201 Created` and a
//! `Location` header pointing at them.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use edv_core::document::StructuredDocument;

use crate::error::AppError;
use crate::state::AppState;

/// Build the vault router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/data-vaults", post(create_vault))
        .route("/encrypted-data-vaults/{vault_id}/docs", post(store_document))
        .route(
            "/encrypted-data-vaults/{vault_id}/docs/{doc_id}",
            get(retrieve_document),
        )
}

// ── Request types ────────────────────────────────────────────────────

/// Body of a vault creation request.
///
/// Only `referenceId` names the vault; the remaining fields describe the
/// client's keys and authorization and are accepted for interoperability.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVaultConfiguration {
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub controller: String,
    #[serde(default)]
    pub invoker: String,
    #[serde(default)]
    pub delegator: String,
    pub reference_id: String,
    #[serde(default)]
    pub kek: KeyReference,
    #[serde(default)]
    pub hmac: KeyReference,
}

/// A key identifier and its type.
#[derive(Debug, Default, Deserialize)]
pub struct KeyReference {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

fn vault_location(vault_id: &str) -> String {
    format!("/encrypted-data-vaults/{}", urlencoding::encode(vault_id))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Create a new data vault named by the configuration's `referenceId`.
async fn create_vault(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DataVaultConfiguration>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(config) = body?;
    debug!(
        reference_id = %config.reference_id,
        controller = %config.controller,
        sequence = config.sequence,
        "create vault requested"
    );

    state.vaults.create_vault(&config.reference_id).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, vault_location(&config.reference_id))],
    ))
}

/// Store a document in an existing vault.
async fn store_document(
    State(state): State<Arc<AppState>>,
    Path(vault_id): Path<String>,
    body: Result<Json<StructuredDocument>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(document) = body?;

    state.vaults.store_document(&vault_id, &document).await?;

    let location = format!(
        "{}/docs/{}",
        vault_location(&vault_id),
        urlencoding::encode(&document.id)
    );
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

/// Return a stored document exactly as the backend hands it back.
async fn retrieve_document(
    State(state): State<Arc<AppState>>,
    Path((vault_id, doc_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = state.vaults.retrieve_document(&vault_id, &doc_id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes))
}
