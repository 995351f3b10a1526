//! Google Analytics 4 Measurement Protocol adapter.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use folio_core::{
    config::{GA4_API_SECRET, GA4_MEASUREMENT_ID},
    event::{AnalyticsEvent, PageViewData, ServerContext, PAGE_VIEW_EVENT},
    provider::{AnalyticsProvider, ProviderConfig, ProviderResult},
};

use super::base::BaseProvider;

pub const NAME: &str = "ga4";

const DEFAULT_ENDPOINT: &str = "https://www.google-analytics.com";

/// Server-side enrichment fields GA4 must not receive.
const STRIPPED_PARAMS: &[&str] = &["client_ip", "server_side"];

#[derive(Debug, Serialize)]
struct MpEvent<'a> {
    name: &'a str,
    params: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct MpPayload<'a> {
    client_id: String,
    events: Vec<MpEvent<'a>>,
}

pub struct Ga4Provider {
    base: BaseProvider,
    measurement_id: Option<String>,
    api_secret: Option<String>,
}

impl Ga4Provider {
    pub fn new(client: Client) -> Self {
        Self {
            base: BaseProvider::new(NAME, client),
            measurement_id: None,
            api_secret: None,
        }
    }

    async fn send(&self, name: &str, properties: &Map<String, Value>) -> ProviderResult {
        let (Some(measurement_id), Some(api_secret)) = (&self.measurement_id, &self.api_secret)
        else {
            self.base
                .debug(&format!("GA4 credentials not configured, skipping '{name}'"));
            return ProviderResult::failed(NAME, "provider not configured", 0);
        };

        let client_id = properties
            .get("client_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_server_client_id);

        let params: Map<String, Value> = properties
            .iter()
            .filter(|(key, _)| !STRIPPED_PARAMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let payload = MpPayload {
            client_id,
            events: vec![MpEvent { name, params }],
        };

        let endpoint = self.base.endpoint().unwrap_or(DEFAULT_ENDPOINT);
        let request = self
            .base
            .client()
            .post(format!("{endpoint}/mp/collect"))
            .query(&[
                ("measurement_id", measurement_id.as_str()),
                ("api_secret", api_secret.as_str()),
            ])
            .json(&payload);
        self.base.execute_request(request).await
    }
}

/// Client ID for events that arrive without one: `<millis>.<random>`.
fn generate_server_client_id() -> String {
    let random: u64 = rand::thread_rng().gen();
    format!("{}.{}", Utc::now().timestamp_millis(), random)
}

#[async_trait]
impl AnalyticsProvider for Ga4Provider {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self, config: &ProviderConfig) {
        self.base.initialize(config);
        self.measurement_id = config.credential(GA4_MEASUREMENT_ID).map(str::to_string);
        self.api_secret = config.credential(GA4_API_SECRET).map(str::to_string);

        let missing = self
            .base
            .missing_credentials(&[GA4_MEASUREMENT_ID, GA4_API_SECRET]);
        if missing.is_empty() {
            self.base.debug("GA4 provider initialized");
        } else {
            self.base.debug(&format!(
                "GA4 missing credentials ({}), tracking disabled",
                missing.join(", ")
            ));
        }
    }

    fn is_configured(&self) -> bool {
        self.measurement_id.is_some() && self.api_secret.is_some()
    }

    async fn track_page_view(
        &self,
        data: &PageViewData,
        _context: Option<&ServerContext>,
    ) -> ProviderResult {
        let mut params = Map::new();
        params.insert("page_location".to_string(), Value::String(data.url.clone()));
        params.insert("page_path".to_string(), Value::String(data.path.clone()));
        params.insert("page_title".to_string(), Value::String(data.title.clone()));
        if let Some(referrer) = &data.referrer {
            params.insert("page_referrer".to_string(), Value::String(referrer.clone()));
        }
        params.insert("timestamp".to_string(), Value::String(data.timestamp.clone()));
        self.send(PAGE_VIEW_EVENT, &params).await
    }

    async fn track_event(
        &self,
        event: &AnalyticsEvent,
        _context: Option<&ServerContext>,
    ) -> Option<ProviderResult> {
        if !self.is_configured() {
            return None;
        }
        Some(self.send(&event.event, &event.properties).await)
    }
}
