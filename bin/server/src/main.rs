use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use switchboard_ai::{AgentInvoker, OpenAiBackend, PersonaCatalog};
use switchboard_conversation::SessionStore;
use switchboard_router::Router;
use switchboard_server::{
    config::ServerConfig,
    db::PgSessionStore,
    error::StartupError,
    routes,
    state::{AppState, StoreHealth},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> switchboard_core::Result<(), StartupError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .map_err(|e| StartupError::Database {
            details: e.to_string(),
        })?;

    let store = Arc::new(PgSessionStore::new(db_pool));
    match store.table_exists().await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("conversation_sessions table is missing; /health will report unavailable");
        }
        Err(e) => tracing::warn!(error = %e, "Failed to check for the sessions table"),
    }

    let backend = OpenAiBackend::new(
        &config.agent.base_url,
        &config.agent.api_key,
        config.agent.timeout(),
    )
    .map_err(|e| StartupError::Agent {
        details: e.to_string(),
    })?;
    let invoker = AgentInvoker::new(
        Arc::new(backend),
        PersonaCatalog::new(&config.agent.model),
        &config.agent,
    );
    let sessions: Arc<dyn SessionStore> = Arc::clone(&store) as Arc<dyn SessionStore>;
    let health: Arc<dyn StoreHealth> = store;
    let router = Router::new(sessions, invoker, &config.session);
    let state = Arc::new(AppState::new(router, health));

    // Evict idle sessions on startup, then periodically
    let eviction_state = Arc::clone(&state);
    let eviction_interval = config.session.eviction_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(eviction_interval);
        loop {
            interval.tick().await;
            match eviction_state.router.evict_idle(chrono::Utc::now()).await {
                Ok(count) if count > 0 => {
                    tracing::info!(evicted_sessions = count, "Evicted idle sessions");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to evict idle sessions");
                }
            }
        }
    });

    let app = routes::app(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| StartupError::Serve {
            details: format!("failed to bind to {}: {e}", config.bind_addr),
        })?;

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
