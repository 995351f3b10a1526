pub mod base;
pub mod ga4;
pub mod goatcounter;
pub mod registry;

#[cfg(test)]
pub(crate) mod fake_vendor;

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use folio_core::{config::Config, provider::AnalyticsProvider};

pub use base::BaseProvider;
pub use ga4::Ga4Provider;
pub use goatcounter::GoatCounterProvider;
pub use registry::{ProviderFactory, ProviderRegistry};

/// HTTP client shared by every provider. Bounded timeouts keep a stalled
/// vendor from holding a request open indefinitely.
pub fn build_http_client() -> anyhow::Result<Client> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(5))
        .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Register the built-in adapters with their env-derived configuration and
/// instantiate each one.
pub async fn register_builtin(registry: &ProviderRegistry, client: &Client, config: &Config) {
    let gc_client = client.clone();
    let gc_config = config.goatcounter.clone();
    registry
        .register(goatcounter::NAME, move || {
            let mut provider = GoatCounterProvider::new(gc_client.clone());
            provider.initialize(&gc_config);
            Box::new(provider) as Box<dyn AnalyticsProvider>
        })
        .await;

    let ga_client = client.clone();
    let ga_config = config.ga4.clone();
    registry
        .register(ga4::NAME, move || {
            let mut provider = Ga4Provider::new(ga_client.clone());
            provider.initialize(&ga_config);
            Box::new(provider) as Box<dyn AnalyticsProvider>
        })
        .await;

    for name in registry.registered_names().await {
        if let Some(provider) = registry.get(&name).await {
            info!(
                provider = %name,
                configured = provider.is_configured(),
                "Analytics provider ready"
            );
        }
    }
}
