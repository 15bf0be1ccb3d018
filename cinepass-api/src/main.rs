use anyhow::Context;
use cinepass_api::{app, state::{AppState, AuthConfig}, worker};
use cinepass_core::SystemClock;
use cinepass_order::{CheckoutPorts, CheckoutService};
use cinepass_store::{HttpOrderGateway, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinepass_api=debug,cinepass_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cinepass_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cinepass checkout API on port {}", config.server.port);

    let backend = Arc::new(
        HttpOrderGateway::new(&config.backend.base_url, Duration::from_millis(config.backend.timeout_ms))
            .context("Failed to create backend client")?,
    );

    let redis = Arc::new(
        RedisClient::new(&config.redis.url)
            .await
            .context("Failed to create Redis client")?,
    );

    let checkout = CheckoutService::new(
        CheckoutPorts {
            orders: backend.clone(),
            wallet: backend.clone(),
            notifications: backend,
            seats: redis.clone(),
            clock: Arc::new(SystemClock),
        },
        config.checkout.settings(),
    );

    let checkout = Arc::new(checkout);
    tokio::spawn(worker::start_session_sweeper(
        checkout.clone(),
        Duration::from_secs(config.checkout.sweep_interval_seconds),
    ));

    let app_state = AppState {
        checkout,
        redis: Some(redis),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rate_limit_per_minute: config.checkout.rate_limit_per_minute,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind listener")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
