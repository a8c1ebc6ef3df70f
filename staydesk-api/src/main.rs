use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use staydesk_api::{
    app,
    state::{AppState, AuthConfig, GuestSettings},
};
use staydesk_store::app_config::{Backend, Config};
use staydesk_store::{
    DbClient, EventProducer, RedisClient, StoreBookingRepository, StoreHotelRepository,
    StoreLinkRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staydesk_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting StayDesk API on port {}", config.server.port);

    let auth = AuthConfig::from_config(&config);
    let guest = GuestSettings::from_config(&config);

    let app_state = match config.server.backend {
        Backend::Memory => {
            tracing::warn!("Running with in-memory storage; nothing survives a restart");
            AppState::in_memory(auth, guest)
        }
        Backend::Postgres => build_state(&config, auth, guest).await?,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;
    Ok(())
}

async fn build_state(config: &Config, auth: AuthConfig, guest: GuestSettings) -> anyhow::Result<AppState> {
    // Postgres Connection
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis Connection
    let redis = Arc::new(
        RedisClient::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );

    // Kafka Connection
    let kafka = Arc::new(EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?);

    Ok(AppState {
        hotel_repo: Arc::new(StoreHotelRepository::new(db.pool.clone())),
        booking_repo: Arc::new(StoreBookingRepository::new(db.pool.clone())),
        link_repo: Arc::new(StoreLinkRepository::new(db.pool.clone())),
        drafts: redis.clone(),
        events: kafka.clone(),
        mail: kafka,
        redis: Some(redis),
        rate_limit_per_minute: config.server.rate_limit_per_minute,
        auth,
        guest,
    })
}
