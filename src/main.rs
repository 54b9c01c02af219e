mod config;
mod constants;
mod domain;
mod error;
mod logging;
mod publication;
mod routes;
mod scheduler;
mod services;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::AppConfig;
use publication::Publication;
use services::audit::AuditLogger;
use services::twitter::{TwitterApi, TwitterClient};
use store::{PgStore, Store};

pub struct AppState {
    db: PgPool,
    config: AppConfig,
    store: Arc<dyn Store>,
    twitter: Arc<dyn TwitterApi>,
    audit: AuditLogger,
    publication: Publication,
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(config.log_format);

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .expect("Failed to build HTTP client");
    let twitter: Arc<dyn TwitterApi> = Arc::new(TwitterClient::new(&config.twitter, http));

    let pg_store = Arc::new(PgStore::new(pool.clone()));
    let store: Arc<dyn Store> = pg_store.clone();
    let audit = AuditLogger::new(pg_store);

    let publication = Publication::new(
        store.clone(),
        twitter.clone(),
        audit.clone(),
        config.status_policy,
        config.claim_lease_secs,
    );

    if let Some(every) = config.scheduler_interval {
        tokio::spawn(scheduler::start_background_scheduler(
            publication.clone(),
            every,
        ));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = Arc::new(AppState {
        db: pool,
        config,
        store,
        twitter,
        audit,
        publication,
    });

    let app = routes::build_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    tracing::info!(%addr, "Listening");
    // Rate limiting keys on the peer address when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
