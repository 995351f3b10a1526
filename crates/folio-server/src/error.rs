use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Client-visible rejections of `POST /api/events`.
///
/// Every variant implements [`IntoResponse`] with a flat `{ "error": ... }`
/// body, so handlers can return `Result<impl IntoResponse, IngestError>`.
/// Provider failures never appear here; they are absorbed during dispatch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request too large")]
    PayloadTooLarge,

    #[error("Invalid request body")]
    InvalidBody,

    #[error("Event name is required and must be a string")]
    EventNameRequired,

    #[error("Invalid event name. Use alphanumeric characters and underscore only, max 50 characters")]
    InvalidEventName,

    #[error("Properties must be an object")]
    PropertiesNotObject,

    #[error("Properties object too complex or large")]
    PropertiesTooComplex,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited {
        limit: u32,
        window_secs: u64,
        retry_after_secs: u64,
    },
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            IngestError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::InvalidBody
            | IngestError::EventNameRequired
            | IngestError::InvalidEventName
            | IngestError::PropertiesNotObject
            | IngestError::PropertiesTooComplex => StatusCode::BAD_REQUEST,
            IngestError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();

        if let IngestError::RateLimited {
            limit,
            window_secs,
            retry_after_secs,
        } = self
        {
            let headers = response.headers_mut();
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-window", HeaderValue::from(window_secs));
        }

        response
    }
}
