use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{http::HeaderValue, Server};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use todo_api::{
    config::Config,
    db,
    route::{cors_layer, create_router},
    AppState,
};

// Entry point of the application
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,todo_api=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;

    // Connect to the database, creating it on first start
    let pool = match db::connect(&config.database_url, config.max_connections).await {
        Ok(pool) => {
            tracing::info!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };
    db::migrate(&pool).await.context("failed to create tables")?;

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .context("CORS_ORIGIN is not a valid header value")?;

    // Create an Arc-wrapped instance of the application state
    let app_state = Arc::new(AppState::new(pool, &config));

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin));

    // Specify the address and port to run the server on
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("🚀 Server started successfully on {}", addr);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutting down");
}
