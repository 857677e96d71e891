//! HTTP handlers for the transport boundary.
//!
//! Both endpoints answer with the shared wire envelopes: failures travel
//! as `success: false` plus an error string, not as HTTP status codes.
//! The store is synchronous by design (its critical section holds an OS
//! file lock), so every store call runs on the blocking thread pool.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use folio_core::store::ConfigStore;
use folio_core::sync::transport::{ConfigResponse, SectionUpdate, UpdateResponse};

pub(crate) type SharedStore = Arc<ConfigStore>;

/// `GET /api/config` — returns the current durably-saved document.
pub(crate) async fn get_config(State(store): State<SharedStore>) -> Json<ConfigResponse> {
    let result = tokio::task::spawn_blocking(move || {
        store.read().map(|mut document| {
            // Keys are normalized before the JSON envelope is built; the
            // on-disk file may predate the daemon and carry typed keys.
            document.normalize_keys();
            document
        })
    })
    .await;
    match result {
        Ok(Ok(document)) => Json(ConfigResponse::ok(document)),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "document read failed");
            Json(ConfigResponse::error(err.to_string()))
        },
        Err(err) => Json(ConfigResponse::error(format!("worker task failed: {err}"))),
    }
}

/// `POST /api/config` — applies one section-level replacement.
pub(crate) async fn update_config(
    State(store): State<SharedStore>,
    Json(update): Json<SectionUpdate>,
) -> Json<UpdateResponse> {
    let section = update.section.clone();
    let result = tokio::task::spawn_blocking(move || {
        let value = serde_yaml::to_value(&update.value)
            .map_err(|err| format!("invalid section value: {err}"))?;
        store
            .write(&update.section, value)
            .map_err(|err| err.to_string())
    })
    .await;
    match result {
        Ok(Ok(())) => {
            tracing::info!(section, "section updated");
            Json(UpdateResponse::ok(format!("section '{section}' updated")))
        },
        Ok(Err(detail)) => {
            tracing::warn!(section, error = %detail, "section update rejected");
            Json(UpdateResponse::error(detail))
        },
        Err(err) => Json(UpdateResponse::error(format!("worker task failed: {err}"))),
    }
}
