use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// `GET /health`: liveness check.
///
/// Always `200 OK` while the process is serving. Lists the instantiated
/// providers with whether each one has usable credentials.
///
/// Response shape:
/// ```json
/// { "status": "ok", "version": "0.1.0", "providers": [{ "name": "goatcounter", "configured": true }] }
/// ```
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let providers: Vec<_> = state
        .active_providers()
        .await
        .iter()
        .map(|p| json!({ "name": p.name(), "configured": p.is_configured() }))
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "providers": providers
        })),
    )
}
