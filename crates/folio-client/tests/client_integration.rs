use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use folio_client::{
    AnalyticsClient, ClientSettings, HttpTransport, StaticPageContext, StorageChain, CLIENT_ID_KEY,
};

#[derive(Clone)]
struct Ingest {
    status: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn collect(State(ingest): State<Ingest>, Json(body): Json<Value>) -> StatusCode {
    ingest.received.lock().expect("received lock").push(body);
    ingest.status
}

/// Local stand-in for `POST /api/events`.
async fn start_ingest(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/events", post(collect))
        .with_state(Ingest {
            status,
            received: Arc::clone(&received),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ingest");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{addr}"), received)
}

fn unique_store(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir()
        .join(format!("folio-{prefix}-{}-{nanos}", std::process::id()))
        .join("analytics.json")
}

fn page() -> Arc<StaticPageContext> {
    Arc::new(
        StaticPageContext::new("https://test.com/page")
            .with_title("Test Page")
            .with_referrer("https://example.com"),
    )
}

fn settings() -> ClientSettings {
    ClientSettings { enabled: true }
}

#[tokio::test]
async fn test_page_view_is_posted_as_json() {
    let (base_url, received) = start_ingest(StatusCode::OK).await;
    let transport = Arc::new(HttpTransport::new(&base_url).expect("transport"));
    let client = AnalyticsClient::new(StorageChain::in_memory(), page(), transport, settings());

    let mut props = Map::new();
    props.insert("utm_source".to_string(), json!("newsletter"));
    client.page(None, props).await;

    let received = received.lock().expect("received lock");
    assert_eq!(received.len(), 1);
    let body = &received[0];
    assert_eq!(body["event"], "page_view");
    assert_eq!(body["properties"]["page_path"], "/page");
    assert_eq!(body["properties"]["page_location"], "https://test.com/page");
    assert_eq!(body["properties"]["utm_source"], "newsletter");
    assert_eq!(body["properties"]["client_id"], client.client_id());
}

#[tokio::test]
async fn test_server_error_is_swallowed() {
    let (base_url, received) = start_ingest(StatusCode::INTERNAL_SERVER_ERROR).await;
    let transport = Arc::new(HttpTransport::new(&base_url).expect("transport"));
    let client = AnalyticsClient::new(StorageChain::in_memory(), page(), transport, settings());

    client.track("click", Map::new()).await;
    client.track("click", Map::new()).await;

    assert_eq!(received.lock().expect("received lock").len(), 2);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_swallowed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let transport = Arc::new(HttpTransport::new(&format!("http://{addr}")).expect("transport"));
    let client = AnalyticsClient::new(StorageChain::in_memory(), page(), transport, settings());

    client.track("click", Map::new()).await;
}

#[tokio::test]
async fn test_client_id_persists_in_file_store() {
    let (base_url, received) = start_ingest(StatusCode::OK).await;
    let path = unique_store("client-id");

    let first = AnalyticsClient::new(
        StorageChain::persistent(&path),
        page(),
        Arc::new(HttpTransport::new(&base_url).expect("transport")),
        settings(),
    );
    let second = AnalyticsClient::new(
        StorageChain::persistent(&path),
        page(),
        Arc::new(HttpTransport::new(&base_url).expect("transport")),
        settings(),
    );
    assert_eq!(first.client_id(), second.client_id());

    first.track("a", Map::new()).await;
    second.track("b", Map::new()).await;
    {
        let received = received.lock().expect("received lock");
        assert_eq!(
            received[0]["properties"]["client_id"],
            received[1]["properties"]["client_id"]
        );
    }

    let stored: Value =
        serde_json::from_slice(&std::fs::read(&path).expect("read store")).expect("parse store");
    assert_eq!(stored[CLIENT_ID_KEY], first.client_id());

    std::fs::remove_dir_all(path.parent().expect("parent")).ok();
}

#[tokio::test]
async fn test_opt_out_persists_across_clients() {
    let (base_url, received) = start_ingest(StatusCode::OK).await;
    let path = unique_store("opt-out");

    let first = AnalyticsClient::new(
        StorageChain::persistent(&path),
        page(),
        Arc::new(HttpTransport::new(&base_url).expect("transport")),
        settings(),
    );
    first.opt_out();

    let second = AnalyticsClient::new(
        StorageChain::persistent(&path),
        page(),
        Arc::new(HttpTransport::new(&base_url).expect("transport")),
        settings(),
    );
    assert!(second.is_opted_out());
    second.page(None, Map::new()).await;
    assert!(received.lock().expect("received lock").is_empty());

    second.opt_in();
    assert!(!first.is_opted_out());

    std::fs::remove_dir_all(path.parent().expect("parent")).ok();
}
