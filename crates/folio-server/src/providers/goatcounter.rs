//! GoatCounter adapter.
//!
//! GoatCounter models page hits only, so named events other than
//! `page_view` are dropped. API reference: <https://www.goatcounter.com/api>.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use folio_core::{
    config::{GOATCOUNTER_API_TOKEN, GOATCOUNTER_SITE_CODE},
    event::{AnalyticsEvent, PageViewData, ServerContext},
    provider::{AnalyticsProvider, ProviderConfig, ProviderResult},
};

use super::base::BaseProvider;

pub const NAME: &str = "goatcounter";

const MIN_TOKEN_LEN: usize = 10;

#[derive(Debug, Serialize)]
struct Hit<'a> {
    path: &'a str,
    title: &'a str,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    referrer: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CountPayload<'a> {
    hits: Vec<Hit<'a>>,
}

pub struct GoatCounterProvider {
    base: BaseProvider,
    site_code: Option<String>,
    api_token: Option<String>,
}

impl GoatCounterProvider {
    pub fn new(client: Client) -> Self {
        Self {
            base: BaseProvider::new(NAME, client),
            site_code: None,
            api_token: None,
        }
    }

    fn count_url(&self, site_code: &str) -> String {
        match self.base.endpoint() {
            Some(endpoint) => format!("{endpoint}/api/v0/count"),
            None => format!("https://{site_code}.goatcounter.com/api/v0/count"),
        }
    }
}

fn is_valid_site_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait]
impl AnalyticsProvider for GoatCounterProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self, config: &ProviderConfig) {
        self.base.initialize(config);

        self.site_code = config.credential(GOATCOUNTER_SITE_CODE).map(str::to_string);
        self.api_token = config.credential(GOATCOUNTER_API_TOKEN).map(str::to_string);

        if let Some(code) = self.site_code.as_deref() {
            if !is_valid_site_code(code) {
                self.base
                    .error(&format!("Invalid {GOATCOUNTER_SITE_CODE} format: {code}"));
                self.site_code = None;
            }
        }
        if self
            .api_token
            .as_deref()
            .is_some_and(|token| token.chars().count() < MIN_TOKEN_LEN)
        {
            self.base
                .error(&format!("Invalid {GOATCOUNTER_API_TOKEN}: token too short"));
            self.api_token = None;
        }

        if self.is_configured() {
            self.base.debug("GoatCounter provider initialized");
        } else {
            let missing = self
                .base
                .missing_credentials(&[GOATCOUNTER_SITE_CODE, GOATCOUNTER_API_TOKEN]);
            self.base.debug(&format!(
                "GoatCounter missing credentials ({}), tracking disabled",
                missing.join(", ")
            ));
        }
    }

    fn is_configured(&self) -> bool {
        self.site_code.is_some() && self.api_token.is_some()
    }

    async fn track_page_view(
        &self,
        data: &PageViewData,
        _context: Option<&ServerContext>,
    ) -> ProviderResult {
        let (Some(site_code), Some(api_token)) = (&self.site_code, &self.api_token) else {
            self.base.debug("Skipping page view, provider not configured");
            return ProviderResult::failed(NAME, "provider not configured", 0);
        };

        let payload = CountPayload {
            hits: vec![Hit {
                path: &data.path,
                title: &data.title,
                referrer: data.referrer.as_deref(),
            }],
        };
        if self.base.is_debug() {
            self.base.debug(&format!(
                "Sending to GoatCounter: {}",
                serde_json::to_string(&payload).unwrap_or_default()
            ));
        }

        let request = self
            .base
            .client()
            .post(self.count_url(site_code))
            .bearer_auth(api_token)
            .json(&payload);
        self.base.execute_request(request).await
    }

    async fn track_event(
        &self,
        event: &AnalyticsEvent,
        context: Option<&ServerContext>,
    ) -> Option<ProviderResult> {
        if !self.is_configured() {
            self.base.debug(&format!(
                "Skipping event '{}', provider not configured",
                event.event
            ));
            return None;
        }
        if !event.is_page_view() {
            self.base.debug(&format!(
                "Skipping non-pageview event '{}', GoatCounter only supports pageviews",
                event.event
            ));
            return None;
        }
        let data = PageViewData::from_event(event);
        Some(self.track_page_view(&data, context).await)
    }
}
