use anyhow::{Context, Result};
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use connect_gateway::api::{create_gateway_router, GatewayAppState};
use connect_gateway::config::{load_config, GatewayConfig};
use connect_gateway::identity::HeaderIdentity;
use connect_gateway::platform::ConnectClient;
use connect_gateway::Gateway;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connect_gateway=info".into()),
        )
        .init();

    info!("Connector gateway starting...");

    // File config is optional; env overrides apply either way
    let config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => GatewayConfig::default(),
    }
    .apply_env();
    config.validate().context("Invalid gateway configuration")?;

    info!(
        base_url = %config.platform.base_url,
        project_id = %config.platform.project_id,
        environment = config.platform.environment.as_str(),
        max_concurrency = config.cascade.max_concurrency,
        port = config.server.port,
        "Configuration loaded"
    );

    let client = ConnectClient::new(&config.platform)
        .context("Failed to initialize platform client")?;
    let gateway = Arc::new(Gateway::new(Arc::new(client), &config));

    let state = GatewayAppState {
        gateway,
        identity: Arc::new(HeaderIdentity::new(config.server.identity_header.clone())),
    };
    let router = create_gateway_router(state).layer(build_cors_layer(&config)?);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port))
        .await
        .context("Failed to bind gateway port")?;
    info!(port = config.server.port, "Gateway API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
            }
            info!("Shutdown signal received");
        })
        .await
        .context("Gateway API server error")?;

    info!("Connector gateway stopped");
    Ok(())
}

/// CORS for the host UI: the default connect origin plus the identity header.
fn build_cors_layer(config: &GatewayConfig) -> Result<CorsLayer> {
    let origin: HeaderValue = config
        .connect
        .default_allowed_origin
        .parse()
        .with_context(|| {
            format!(
                "Invalid CORS origin '{}'",
                config.connect.default_allowed_origin
            )
        })?;
    let identity_header = HeaderName::from_bytes(config.server.identity_header.as_bytes())
        .with_context(|| format!("Invalid identity header '{}'", config.server.identity_header))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, identity_header])
        .max_age(Duration::from_secs(3600)))
}
