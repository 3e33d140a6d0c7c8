use actix_web::{middleware::Logger, web, App, HttpServer};
use redis_utils::{RedisPool, RedisSettings};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use timeline_cache::{CacheMetrics, CacheStore, MemoryCacheStore, RedisCacheStore};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timeline_service::config::{CacheBackend, Config};
use timeline_service::db::{
    self, PgContentRepository, PgProfileRepository, PgSocialGraph, PgTimelineStore,
};
use timeline_service::{build_state, handlers, Backends};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting timeline-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let pool = match db::create_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    if config.database.run_migrations {
        if let Err(e) = db::run_migrations(&pool).await {
            error!("Database migration failed: {:#}", e);
            eprintln!("ERROR: Failed to run migrations: {}", e);
            std::process::exit(1);
        }
    }

    let cache_store: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Redis => {
            let settings = RedisSettings::new(
                config.cache.redis_url.clone(),
                Duration::from_millis(config.cache.command_timeout_ms),
            );
            match RedisPool::connect(&settings).await {
                Ok(redis) => Arc::new(RedisCacheStore::from_pool(&redis)),
                Err(e) => {
                    error!("Redis connection failed: {:#}", e);
                    eprintln!("ERROR: Failed to connect to Redis: {}", e);
                    std::process::exit(1);
                }
            }
        }
        CacheBackend::Memory => {
            warn!("Using in-process cache store; not shared between instances");
            Arc::new(MemoryCacheStore::new())
        }
    };

    if let Err(e) = CacheMetrics::register(prometheus::default_registry()) {
        warn!("Cache metrics registration failed: {}", e);
    }

    let state = web::Data::new(build_state(
        Backends {
            timelines: Arc::new(PgTimelineStore::new(pool.clone())),
            graph: Arc::new(PgSocialGraph::new(pool.clone())),
            contents: Arc::new(PgContentRepository::new(pool.clone())),
            profiles: Arc::new(PgProfileRepository::new(pool)),
        },
        cache_store,
        config.cache.object_ttl_secs,
        config.timeline.clone(),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.app.port);
    info!("HTTP server listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
