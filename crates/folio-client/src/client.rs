use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use folio_core::event::{AnalyticsEvent, PAGE_VIEW_EVENT};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::client_id::generate_client_id;
use crate::context::PageContext;
use crate::storage::{StorageChain, StorageOptions};
use crate::transport::EventTransport;

/// Storage key holding the visitor's client ID.
pub const CLIENT_ID_KEY: &str = "analytics_client_id";
/// Storage key holding the opt-out flag (`"true"` when opted out).
pub const OPT_OUT_KEY: &str = "analytics_opt_out";

/// Returns `false` only when the crate was built with
/// `FOLIO_ANALYTICS_ENABLED=false`.
fn enabled_at_build() -> bool {
    !matches!(option_env!("FOLIO_ANALYTICS_ENABLED"), Some("false"))
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Kill switch. Defaults to the build-time `FOLIO_ANALYTICS_ENABLED` flag.
    pub enabled: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            enabled: enabled_at_build(),
        }
    }
}

/// Vendor-agnostic tracking façade.
///
/// Whether tracking is allowed is decided on every call, so an opt-out or a
/// Do-Not-Track change takes effect immediately. Delivery failures are logged
/// and swallowed; no method on this type returns an error.
pub struct AnalyticsClient {
    client_id: String,
    storage: StorageChain,
    page: Arc<dyn PageContext>,
    transport: Arc<dyn EventTransport>,
    settings: ClientSettings,
}

impl AnalyticsClient {
    /// Build a client, reusing the stored client ID or minting and storing a
    /// new one.
    pub fn new(
        storage: StorageChain,
        page: Arc<dyn PageContext>,
        transport: Arc<dyn EventTransport>,
        settings: ClientSettings,
    ) -> Self {
        let client_id = get_or_create_client_id(&storage);
        Self {
            client_id,
            storage,
            page,
            transport,
            settings,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Do-Not-Track, then the opt-out flag, then the kill switch.
    pub fn is_enabled(&self) -> bool {
        if self.page.do_not_track() {
            return false;
        }
        if self.is_opted_out() {
            return false;
        }
        self.settings.enabled
    }

    /// Send `event` with the caller's properties plus client and page context.
    /// Context fields win over caller fields of the same name.
    pub async fn track(&self, event: &str, properties: Map<String, Value>) {
        if !self.is_enabled() {
            debug!(event, "Analytics disabled, skipping event");
            return;
        }

        let mut properties = properties;
        properties.insert("client_id".to_string(), json!(self.client_id));
        properties.insert("page_url".to_string(), json!(self.page.href()));
        properties.insert("page_title".to_string(), json!(self.page.title()));
        properties.insert("page_referrer".to_string(), json!(self.page.referrer()));
        properties.insert(
            "timestamp".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let payload = AnalyticsEvent::new(event, properties);
        if let Err(e) = self.transport.send(&payload).await {
            warn!(event, error = %e, "Analytics tracking error");
        }
    }

    /// Track a page view for `path`, or the current page when `None`.
    pub async fn page(&self, path: Option<&str>, properties: Map<String, Value>) {
        let path = path
            .map(str::to_string)
            .unwrap_or_else(|| self.page.pathname());
        let mut properties = properties;
        properties.insert("page_path".to_string(), json!(path));
        properties.insert("page_location".to_string(), json!(self.page.href()));
        self.track(PAGE_VIEW_EVENT, properties).await;
    }

    /// Associate the visitor with `user_id`. Traits override `user_id` when
    /// they carry the same key.
    pub async fn identify(&self, user_id: &str, traits: Map<String, Value>) {
        let properties = merged(json!({ "user_id": user_id }), traits);
        self.track("user_identify", properties).await;
    }

    pub async fn track_click(&self, element: &str, properties: Map<String, Value>) {
        let properties = merged(json!({ "element": element }), properties);
        self.track("click", properties).await;
    }

    /// Report an error. The `error_stack` field carries the error's source
    /// chain, outermost first.
    pub async fn track_error(
        &self,
        error: &(dyn std::error::Error + 'static),
        context: Map<String, Value>,
    ) {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        let stack = if chain.is_empty() {
            "No stack trace available".to_string()
        } else {
            chain.join("\n")
        };
        let properties = merged(
            json!({ "error_message": error.to_string(), "error_stack": stack }),
            context,
        );
        self.track("error", properties).await;
    }

    pub async fn track_timing(&self, name: &str, duration: Duration, properties: Map<String, Value>) {
        let properties = merged(
            json!({
                "timing_name": name,
                "timing_duration": u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
            }),
            properties,
        );
        self.track("timing", properties).await;
    }

    /// Await `work`, then record a page view for the current page. The page
    /// view never affects `work`'s output.
    pub async fn with_page_tracking<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let output = work.await;
        self.page(None, Map::new()).await;
        output
    }

    pub fn opt_out(&self) {
        if !self
            .storage
            .set_item(OPT_OUT_KEY, "true", &StorageOptions::default())
        {
            warn!("Unable to persist opt-out preference");
        }
        info!("Analytics opt-out enabled");
    }

    pub fn opt_in(&self) {
        if !self
            .storage
            .remove_item(OPT_OUT_KEY, &StorageOptions::default())
        {
            warn!("Unable to persist opt-in preference");
        }
        info!("Analytics opt-out disabled");
    }

    pub fn is_opted_out(&self) -> bool {
        self.storage
            .get_item(OPT_OUT_KEY, &StorageOptions::default())
            .is_some_and(|v| v == "true")
    }
}

fn get_or_create_client_id(storage: &StorageChain) -> String {
    let options = StorageOptions::default();
    if let Some(existing) = storage
        .get_item(CLIENT_ID_KEY, &options)
        .filter(|id| !id.is_empty())
    {
        return existing;
    }

    let client_id = generate_client_id();
    if !storage.set_item(CLIENT_ID_KEY, &client_id, &options) {
        warn!("Unable to persist client ID, using session-only tracking");
    }
    client_id
}

/// `base` fields first, then `extra` on top.
fn merged(base: Value, extra: Map<String, Value>) -> Map<String, Value> {
    let mut out = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    out.extend(extra);
    out
}
