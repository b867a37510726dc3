pub mod booking;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use booking::BookingEngine;
use store::{BookingStore, PgBookingStore};

// Shared state для всего приложения
pub struct AppState {
    pub config: config::Config,
    pub engine: Arc<BookingEngine>,
    pub cache: cache::CacheService,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database).await?;
        info!("Database connected");

        db.run_migrations().await?;

        let store = PgBookingStore::new(db.pool.clone(), config.booking.lock_timeout_ms);

        // Redis нужен только для кеша доступности, без него сервис работает
        let cache = match &config.redis.url {
            Some(url) => match redis_client::RedisClient::new(url).await {
                Ok(redis) => {
                    info!("Redis connected");
                    cache::CacheService::new(redis, config.redis.availability_ttl_seconds)
                }
                Err(e) => {
                    warn!("Redis unavailable, availability cache disabled: {}", e);
                    cache::CacheService::disabled()
                }
            },
            None => cache::CacheService::disabled(),
        };

        Ok(Self::with_store(config, Arc::new(store), cache))
    }

    pub fn with_store(
        config: config::Config,
        store: Arc<dyn BookingStore>,
        cache: cache::CacheService,
    ) -> Arc<Self> {
        let engine = Arc::new(BookingEngine::new(store, config.booking.clone()));
        Arc::new(Self {
            config,
            engine,
            cache,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
