pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod realtime;
pub mod server;
pub mod uploads;

pub use config::Config;
pub use database::DbPool;
