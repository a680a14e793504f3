use serde::Serialize;
use sqlx::FromRow;

/// A user account row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub online: bool,
    pub last_activity: Option<String>,
    pub created_at: String,
}

/// A stored message row. Immutable once inserted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub kind: String,
    pub timestamp: String,
}
