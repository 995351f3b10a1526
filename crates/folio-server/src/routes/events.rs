use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use folio_core::{
    event::{AnalyticsEvent, ServerContext},
    sanitize::{sanitize_properties, validate_event_name},
};

use crate::{
    dispatch::dispatch_event,
    error::IngestError,
    rate_limit::RateLimitDecision,
    state::AppState,
};

/// Headers never copied into the per-request context.
const REDACTED_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization"];

/// `POST /api/events`: accept one analytics event and forward it to every
/// configured provider.
///
/// ## Validation (first failure wins)
/// 1. declared or actual body size above the ceiling → 413
/// 2. body missing, not JSON, or not an object → 400
/// 3. `event` missing or not a string → 400
/// 4. `event` not matching `^[A-Za-z0-9_]{1,50}$` → 400
/// 5. `properties` present but not an object → 400
/// 6. `properties` cannot be sanitized → 400
/// 7. per-IP rate limit exceeded → 429 with `Retry-After`
///
/// ## Response
/// `200` with `{ "success": true }` once validation passes, whatever the
/// providers do. If dispatch fails unexpectedly the body also carries a
/// `warning`; analytics must never break the caller's page.
#[tracing::instrument(skip(state, headers, body))]
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, IngestError> {
    let max_bytes = state.config.max_body_bytes;

    // --- Size: checked before the body is parsed ---
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_bytes) {
        return Err(IngestError::PayloadTooLarge);
    }
    // Chunked or under-declared bodies are cut off at the same ceiling.
    let body = to_bytes(body, max_bytes).await.map_err(|e| {
        debug!(error = %e, "Request body rejected");
        IngestError::PayloadTooLarge
    })?;

    // --- Shape ---
    let Ok(Value::Object(mut payload)) = serde_json::from_slice::<Value>(&body) else {
        return Err(IngestError::InvalidBody);
    };

    let event_name = match payload.get("event") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(IngestError::EventNameRequired),
    };
    if !validate_event_name(&event_name) {
        return Err(IngestError::InvalidEventName);
    }

    let properties = payload.remove("properties").unwrap_or(Value::Null);
    if !matches!(properties, Value::Null | Value::Object(_)) {
        return Err(IngestError::PropertiesNotObject);
    }
    let mut properties = sanitize_properties(&properties).map_err(|e| {
        debug!(error = %e, "Property sanitization failed");
        IngestError::PropertiesTooComplex
    })?;

    // --- Rate limit ---
    let client_ip = extract_client_ip(&headers);
    if !state.config.rate_limit_disable {
        if let RateLimitDecision::Limited { retry_after } =
            state.rate_limiter.check(&client_ip).await
        {
            let limits = state.rate_limiter.config();
            warn!(
                client_ip = %client_ip,
                resets_in_secs = retry_after.as_secs(),
                "Analytics rate limit exceeded"
            );
            return Err(IngestError::RateLimited {
                limit: limits.max_requests,
                window_secs: limits.window_secs,
                retry_after_secs: limits.window_secs,
            });
        }
    }

    // --- Enrichment ---
    let context = ServerContext {
        client_ip,
        user_agent: header_str(&headers, header::USER_AGENT.as_str()),
        referer: header_str(&headers, header::REFERER.as_str()),
        headers: snapshot_headers(&headers),
    };
    properties.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
    properties.insert("user_agent".to_string(), json!(context.user_agent));
    properties.insert("client_ip".to_string(), json!(context.client_ip));
    properties.insert("referer".to_string(), json!(context.referer));
    properties.insert("server_side".to_string(), json!(true));

    let event = Arc::new(AnalyticsEvent::new(event_name, properties));
    let providers = state.active_providers().await;

    // Dispatch runs as its own task so an unexpected panic is caught here and
    // turned into a soft success.
    let dispatch = tokio::spawn(dispatch_event(providers, event, Arc::new(context)));
    match dispatch.await {
        Ok(results) => {
            debug!(providers = results.len(), "Event dispatched");
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => {
            warn!(error = %e, "Analytics dispatch failed");
            Ok(Json(json!({
                "success": true,
                "warning": "Analytics tracking failed"
            })))
        }
    }
}

/// Fallback for every non-POST method on `/api/events`.
pub async fn method_not_allowed() -> IngestError {
    IngestError::MethodNotAllowed
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve the client IP: the left-most `X-Forwarded-For` entry (the original
/// client), else `X-Real-IP`, else `"unknown"`.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn snapshot_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !REDACTED_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
