use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use folio_server::{app::build_app, config::Config, state::AppState};

/// `folio health`: liveness probe for container HEALTHCHECK.
///
/// Calls `GET http://localhost:$FOLIO_PORT/health`. Returns the process exit
/// code: 0 on HTTP 200, 1 otherwise.
async fn run_health_check() -> i32 {
    let port = std::env::var("FOLIO_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => 0,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        std::process::exit(run_health_check().await);
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio=info".parse()?)
                .add_directive("folio_server=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env()?;

    if cfg.rate_limit_disable {
        tracing::warn!("Rate limiting disabled (FOLIO_RATE_LIMIT_DISABLE)");
    }

    let state = Arc::new(AppState::with_builtin_providers(cfg.clone()).await?);
    let app = build_app(Arc::clone(&state));

    let addr = cfg.bind_addr();
    info!(
        port = cfg.port,
        max_body_bytes = cfg.max_body_bytes,
        rate_limit = cfg.rate_limit.max_requests,
        rate_window_secs = cfg.rate_limit.window_secs,
        "folio listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let state_for_shutdown = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // Providers that batch get one chance to drain.
    for provider in state_for_shutdown.active_providers().await {
        if let Err(e) = provider.flush().await {
            tracing::warn!(provider = provider.name(), error = %e, "Provider flush failed");
        }
    }

    Ok(())
}
