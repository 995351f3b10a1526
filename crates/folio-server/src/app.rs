use std::sync::Arc;

use axum::{
    http::HeaderValue,
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `CorsLayer`: only when `cors_origins` is configured; the site normally
///    posts events same-origin.
/// 2. `TraceLayer`: structured request/response logging via `tracing`.
///
/// Any method other than POST on `/api/events` gets a JSON 405. axum's
/// default body limit is disabled there; `ingest` enforces `max_body_bytes`
/// itself so oversized bodies get the JSON 413.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let router = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/events",
            post(routes::events::ingest)
                .fallback(routes::events::method_not_allowed)
                .layer(DefaultBodyLimit::disable()),
        )
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
