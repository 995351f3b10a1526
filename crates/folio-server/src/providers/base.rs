use std::time::Instant;

use reqwest::{Client, RequestBuilder};
use tracing::{debug, error};
use url::Url;

use folio_core::provider::{ProviderConfig, ProviderResult};

/// Shared scaffolding embedded by every concrete provider: configuration,
/// the HTTP client, name-tagged logging and uniform request classification.
#[derive(Debug, Clone)]
pub struct BaseProvider {
    name: &'static str,
    client: Client,
    config: Option<ProviderConfig>,
}

impl BaseProvider {
    pub fn new(name: &'static str, client: Client) -> Self {
        Self {
            name,
            client,
            config: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> Option<&ProviderConfig> {
        self.config.as_ref()
    }

    /// Store `config`. Credential values are never logged, only their names.
    /// An endpoint override that is not an http(s) URL is discarded.
    pub fn initialize(&mut self, config: &ProviderConfig) {
        let mut config = config.clone();
        if let Some(endpoint) = config.endpoint.take() {
            if is_http_url(&endpoint) {
                config.endpoint = Some(endpoint);
            } else {
                error!(
                    provider = self.name,
                    endpoint = %endpoint,
                    "Ignoring invalid endpoint override"
                );
            }
        }
        if config.debug {
            let mut keys: Vec<&str> = config.credentials.keys().map(String::as_str).collect();
            keys.sort_unstable();
            debug!(
                provider = self.name,
                credentials = ?keys,
                endpoint = ?config.endpoint,
                "Provider initialized"
            );
        }
        self.config = Some(config);
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_debug(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.debug)
    }

    pub fn credential(&self, key: &str) -> Option<&str> {
        self.config.as_ref().and_then(|c| c.credential(key))
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|c| c.endpoint.as_deref())
            .map(|e| e.trim_end_matches('/'))
    }

    /// Names of `required` credentials that are absent or empty.
    pub fn missing_credentials(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|key| self.credential(key).is_none())
            .map(|key| key.to_string())
            .collect()
    }

    pub fn debug(&self, message: &str) {
        if self.is_debug() {
            debug!(provider = self.name, "{message}");
        }
    }

    pub fn error(&self, message: &str) {
        error!(provider = self.name, "{message}");
    }

    /// Send `request`, timing it and folding every outcome into a
    /// [`ProviderResult`]. Non-2xx responses and transport errors become
    /// failed results; nothing is returned as an error.
    pub async fn execute_request(&self, request: RequestBuilder) -> ProviderResult {
        let started = Instant::now();
        self.debug("Sending request");

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let duration_ms = elapsed_ms(started);
                    self.debug(&format!("Request succeeded in {duration_ms}ms"));
                    return ProviderResult::ok(self.name, duration_ms);
                }
                let body = response.text().await.unwrap_or_default();
                let duration_ms = elapsed_ms(started);
                error!(
                    provider = self.name,
                    status = status.as_u16(),
                    body = %body,
                    "Provider request failed"
                );
                ProviderResult::failed(
                    self.name,
                    format!("HTTP {}: {}", status.as_u16(), body),
                    duration_ms,
                )
            }
            Err(e) => {
                let duration_ms = elapsed_ms(started);
                error!(provider = self.name, error = %e, "Provider request failed with exception");
                ProviderResult::failed(self.name, e.to_string(), duration_ms)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}
