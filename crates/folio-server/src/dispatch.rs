use std::sync::Arc;

use tracing::{debug, info, warn};

use folio_core::{
    event::{AnalyticsEvent, ServerContext},
    provider::{AnalyticsProvider, ProviderResult},
};

/// Send `event` to every configured provider concurrently and wait for all of
/// them.
///
/// Each provider runs in its own task, so a slow provider does not hold up
/// the others and a panicking one is reported as a failed result. Nothing is
/// retried.
pub async fn dispatch_event(
    providers: Vec<Arc<dyn AnalyticsProvider>>,
    event: Arc<AnalyticsEvent>,
    context: Arc<ServerContext>,
) -> Vec<ProviderResult> {
    let mut handles = Vec::new();
    for provider in providers {
        let name = provider.name().to_string();
        if !provider.is_configured() {
            debug!(provider = %name, event = %event.event, "Provider not configured, skipping");
            continue;
        }
        let event = Arc::clone(&event);
        let context = Arc::clone(&context);
        let handle = tokio::spawn(async move {
            provider
                .track_event(&event, Some(context.as_ref()))
                .await
        });
        handles.push((name, handle));
    }

    // Every task is already running; awaiting in order only collects them.
    let mut results = Vec::new();
    for (name, handle) in handles {
        match handle.await {
            Ok(Some(result)) => {
                if result.success {
                    info!(
                        provider = %result.provider,
                        event = %event.event,
                        duration_ms = result.duration_ms,
                        "Event forwarded"
                    );
                } else {
                    warn!(
                        provider = %result.provider,
                        event = %event.event,
                        error = result.error.as_deref().unwrap_or(""),
                        "Event forwarding failed"
                    );
                }
                results.push(result);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(provider = %name, error = %e, "Provider task failed");
                results.push(ProviderResult::failed(name, e.to_string(), 0));
            }
        }
    }
    results
}
