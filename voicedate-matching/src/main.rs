use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

mod config;
mod events;
mod feed;
mod models;
mod routes;
mod schema;

use config::AppConfig;
use feed::selector::FeedSession;
use voicedate_shared::clients::rabbitmq::RabbitMQClient;
use voicedate_shared::clients::redis::RedisClient;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub http_client: reqwest::Client,
    /// One browsing session per signed-in user; a fresh load replaces it.
    pub feeds: DashMap<Uuid, FeedSession>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voicedate_shared::middleware::init_tracing("voicedate-matching");

    let config = AppConfig::load()?;
    let port = config.port;

    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let db = Pool::builder().max_size(10).build(manager)?;

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let http_client = reqwest::Client::new();

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        redis,
        http_client,
        feeds: DashMap::new(),
    });

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Feed browsing
        .route("/feed/load", post(routes::feed::load_feed))
        .route("/feed/current", get(routes::feed::current_card))
        .route("/feed/advance", post(routes::feed::advance_feed))
        .route("/feed/reset", post(routes::feed::reset_feed))
        // Decisions and matches
        .route("/decisions", post(routes::decisions::record_decision))
        .route("/matches", get(routes::matches::list_matches))
        // Internal service-to-service endpoints (no auth)
        .route("/internal/matches/check", get(routes::internal::check_match))
        .route("/internal/profiles/batch", post(routes::internal::batch_profiles))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "voicedate-matching starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
