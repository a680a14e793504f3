pub mod auth;
pub mod messages;
pub mod upload;
pub mod users;
pub mod websocket;
