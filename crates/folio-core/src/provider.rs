use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event::{AnalyticsEvent, PageViewData, ServerContext};

/// Configuration handed to a provider once, at initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Credential name → value, e.g. `GOATCOUNTER_API_TOKEN`.
    pub credentials: HashMap<String, String>,
    #[serde(default)]
    pub debug: bool,
    /// Overrides the vendor base URL (self-hosted vendors, local fakes).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ProviderConfig {
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Outcome of one outbound provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderResult {
    pub provider: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ProviderResult {
    pub fn ok(provider: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            success: true,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// A vendor adapter that forwards generic events to a third-party analytics
/// service.
///
/// Implementations must never surface transport failures as errors: every
/// outbound call is folded into a [`ProviderResult`]. A provider that is not
/// configured sends nothing.
#[async_trait]
pub trait AnalyticsProvider: Send + Sync + 'static {
    /// Stable identifier, e.g. `"goatcounter"`.
    fn name(&self) -> &str;

    /// Store and validate credentials. Invalid credentials leave the provider
    /// unconfigured rather than failing.
    fn initialize(&mut self, config: &ProviderConfig);

    fn is_configured(&self) -> bool;

    async fn track_page_view(
        &self,
        data: &PageViewData,
        context: Option<&ServerContext>,
    ) -> ProviderResult;

    /// Forward an arbitrary event. `None` means the event was skipped, either
    /// because the provider does not model named events or because it
    /// filtered this one out.
    async fn track_event(
        &self,
        _event: &AnalyticsEvent,
        _context: Option<&ServerContext>,
    ) -> Option<ProviderResult> {
        None
    }

    /// Flush anything buffered. Providers that send immediately have nothing
    /// to do.
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
