//! A local HTTP listener standing in for vendor APIs in unit tests.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
    Router,
};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

pub struct FakeVendor {
    pub base_url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl FakeVendor {
    /// Serve every path, answering with `status` and recording each request.
    pub async fn start(status: StatusCode) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            status,
            captured: Arc::clone(&captured),
        };
        let app = Router::new().fallback(record).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake vendor");
        let addr = listener.local_addr().expect("fake vendor addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Self {
            base_url: format!("http://{addr}"),
            captured,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().expect("captured lock").clone()
    }
}

async fn record(
    State(state): State<FakeState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let request = CapturedRequest {
        path_and_query: uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_default(),
        authorization: headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.captured.lock().expect("captured lock").push(request);
    let text = if state.status.is_success() {
        ""
    } else {
        "Internal Server Error"
    };
    (state.status, text)
}
