//! # Server Setup
//!
//! Server initialization, route registration, and HTTP server startup.

// region: --- Imports
use crate::config::Config;
use crate::database::{create_pool, DbPool};
use crate::handlers;
use crate::realtime::Registry;
use crate::uploads::BlobStore;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
// endregion: --- Imports

// region: --- AppState
/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub registry: Arc<Registry>,
    pub blobs: Arc<BlobStore>,
}

impl axum::extract::FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<Registry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<BlobStore> {
    fn from_ref(state: &AppState) -> Self {
        state.blobs.clone()
    }
}
// endregion: --- AppState

// region: --- Server Configuration
/// Server configuration
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000")
    pub bind_address: String,
    /// Allowed CORS origins
    pub allowed_origins: Vec<String>,
    /// Database migrations path
    pub migrations_path: &'static str,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            migrations_path: "./migrations",
        }
    }
}
// endregion: --- Server Configuration

// region: --- Server Setup
/// Initialize and start the HTTP server
///
/// # Errors
///
/// This function will return an error if:
/// - Configuration loading fails
/// - Database connection or migrations fail
/// - The upload directory cannot be created
/// - Server binding fails
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();

    let filter = match log_level.as_str() {
        "trace" => tracing_subscriber::EnvFilter::new("trace"),
        "debug" => tracing_subscriber::EnvFilter::new("debug"),
        "warn" => tracing_subscriber::EnvFilter::new("warn"),
        "error" => tracing_subscriber::EnvFilter::new("error"),
        _ => tracing_subscriber::EnvFilter::new("info"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global tracing subscriber");

    info!("CHAT RELAY BACKEND STARTING");
    info!("Log level: {}", log_level);

    dotenvy::dotenv().ok();

    info!("Loading configuration...");
    let app_config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    app_config.validate().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure data directory exists for SQLite database
    if app_config.database_url.starts_with("sqlite:") {
        let db_path = app_config
            .database_url
            .strip_prefix("sqlite:")
            .unwrap_or_default();
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created database directory: {:?}", parent);
            }
        }
    }

    info!("Connecting to database...");
    let pool = create_pool().await?;

    info!("Running database migrations from: {}", config.migrations_path);
    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(config.migrations_path)).await?;
    migrator.run(&pool).await?;
    info!("Migrations complete");

    let blobs = Arc::new(
        BlobStore::new(
            PathBuf::from(&app_config.upload_dir),
            app_config.max_upload_bytes,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let state = AppState {
        db: pool,
        config: app_config,
        registry: Arc::new(Registry::new()),
        blobs,
    };

    let app = create_router(state, config.allowed_origins.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    info!("SERVER READY: http://{}", config.bind_address);
    log_server_info();

    // ConnectInfo is needed by the WebSocket handler for client addresses
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Create the main application router with all routes
pub fn create_router(state: AppState, allowed_origins: Vec<String>) -> Router {
    use axum::http::{HeaderValue, Method};

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let max_upload = state.config.max_upload_bytes;
    let upload_dir = state.blobs.base_path().to_path_buf();

    Router::new()
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/users", get(handlers::users::roster))
        .route("/api/messages", get(handlers::messages::history))
        .route(
            "/api/upload",
            post(handlers::upload::upload)
                // multipart framing overhead on top of the blob cap
                .layer(DefaultBodyLimit::max(max_upload + 64 * 1024)),
        )
        .route("/api/ws", get(handlers::websocket::chat_websocket))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .route("/health", get(|| async { "OK" }))
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "Route not found") })
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
}

/// Log server information
fn log_server_info() {
    info!("AUTH:");
    info!("   • POST /api/auth/signup");
    info!("   • POST /api/auth/login");
    info!("CHAT:");
    info!("   • GET  /api/users");
    info!("   • GET  /api/messages?from={{user}}&to={{user}}");
    info!("   • POST /api/upload");
    info!("   • GET  /api/ws (realtime channel)");
    info!("   • GET  /uploads/{{blob}}");
    info!("HEALTH:");
    info!("   • GET  /health");
}
// endregion: --- Server Setup
