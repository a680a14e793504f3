//! # Backend Service
//!
//! Thin entry point that delegates to the library for server setup.

use backend::server::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());

    let config = ServerConfig {
        bind_address: format!("0.0.0.0:{port}"),
        migrations_path: "migrations",
        ..Default::default()
    };

    start_server(config).await
}
