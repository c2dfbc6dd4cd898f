use axum::routing::{get, post};
use axum::Router;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use socketioxide::SocketIo;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod models;
mod routes;
mod schema;
mod socket;

use config::AppConfig;
use voicedate_shared::clients::rabbitmq::RabbitMQClient;
use voicedate_shared::clients::redis::RedisClient;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub io: SocketIo,
    pub http_client: reqwest::Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voicedate_shared::middleware::init_tracing("voicedate-messaging");

    let config = AppConfig::load()?;
    let port = config.port;

    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let db = Pool::builder().max_size(10).build(manager)?;

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let redis = RedisClient::connect(&config.redis_url).await?;

    // Socket.IO layer - io lives in AppState so REST routes can emit
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let http_client = reqwest::Client::new();
    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        redis,
        io: io.clone(),
        http_client,
    });

    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef| {
            let state = state.clone();
            async move {
                socket::handlers::on_connect_with_state(socket, state).await;
            }
        }
    });

    // Push match notifications arriving from the matching service
    tokio::spawn(events::subscriber::listen_match_created(state.clone()));

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Conversations
        .route("/conversations", get(routes::conversations::list_conversations))
        .route(
            "/conversations/with/:partner_id",
            post(routes::conversations::get_or_create_conversation),
        )
        // Messages
        .route(
            "/conversations/:id/messages",
            get(routes::messages::list_messages).post(routes::messages::send_message),
        )
        .route("/conversations/:id/read", post(routes::messages::mark_read))
        // Unread count
        .route("/unread-count", get(routes::messages::get_unread_count))
        // Internal service-to-service endpoints (no auth)
        .route(
            "/internal/conversations/batch",
            post(routes::internal::batch_conversations),
        )
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "voicedate-messaging starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
