//! JobHive API server binary.

use std::net::SocketAddr;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jhive_api::{create_router, ApiConfig, AppState};

fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive("jhive=info".parse().unwrap());

    // JSON logs in production (LOG_FORMAT=json), human-readable otherwise
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_target(true))
            .init();
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;
    info!("API config: host={}, port={}", config.host, config.port);

    let state = AppState::new(config.clone()).await?;

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = metrics_enabled.then(|| {
        info!("Prometheus metrics enabled at /metrics");
        jhive_api::metrics::init_metrics()
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // rustls 0.23 requires an explicit process-wide crypto provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();
    info!("Starting jhive-api");

    if let Err(e) = run().await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
