use std::sync::Arc;

use tracing::info;

use folio_core::{config::Config, provider::AnalyticsProvider};

use crate::providers::{self, ProviderRegistry};
use crate::rate_limit::RateLimiter;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// The rate limiter and the provider registry live here rather than in
/// process globals, so each test builds its own isolated instance.
pub struct AppState {
    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Per-IP fixed-window limiter for `POST /api/events`.
    pub rate_limiter: RateLimiter,

    /// Analytics providers every accepted event is forwarded to.
    pub providers: ProviderRegistry,
}

impl AppState {
    /// Build state with an empty registry. Callers register providers
    /// themselves; see [`AppState::with_builtin_providers`].
    pub fn new(config: Config) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            config: Arc::new(config),
            providers: ProviderRegistry::new(),
        }
    }

    /// Build state with the built-in adapters registered and instantiated
    /// from `config`. Providers whose credentials are absent stay registered
    /// but unconfigured, so they are skipped during dispatch.
    pub async fn with_builtin_providers(config: Config) -> anyhow::Result<Self> {
        let state = Self::new(config);
        let client = providers::build_http_client()?;
        providers::register_builtin(&state.providers, &client, &state.config).await;
        let configured = state
            .active_providers()
            .await
            .iter()
            .filter(|p| p.is_configured())
            .count();
        info!(configured, "Analytics providers initialized");
        Ok(state)
    }

    pub async fn active_providers(&self) -> Vec<Arc<dyn AnalyticsProvider>> {
        self.providers.get_all().await
    }
}
