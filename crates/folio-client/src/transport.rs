use std::time::Duration;

use async_trait::async_trait;
use folio_core::event::AnalyticsEvent;
use url::Url;

use crate::error::ClientError;

/// Path of the ingestion endpoint relative to the site origin.
pub const EVENTS_PATH: &str = "/api/events";

/// Delivers one event to the ingestion endpoint.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), ClientError>;
}

/// POSTs events as JSON with `reqwest`. Any non-2xx status is an error.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Transport for the site at `base_url`; events go to `/api/events`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(concat!("folio-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join(EVENTS_PATH))
            .map_err(|e| ClientError::Endpoint(format!("{base_url}: {e}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_joined_to_origin() {
        let transport = HttpTransport::new("https://example.com/blog/").expect("transport");
        assert_eq!(transport.endpoint().as_str(), "https://example.com/api/events");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpTransport::new("not a url"),
            Err(ClientError::Endpoint(_))
        ));
    }
}
