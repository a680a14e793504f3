use super::models::{MessageRecord, User};
use super::DbPool;
use sqlx::query_as;

pub struct UserRepository;

impl UserRepository {
    /// Find user by username
    pub async fn find_by_username(
        pool: &DbPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Create a new user
    pub async fn create(
        pool: &DbPool,
        username: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, online) VALUES (?, ?, 0)",
        )
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();

        query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Update the persisted online flag for a user
    pub async fn set_online(
        pool: &DbPool,
        username: &str,
        online: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET online = ? WHERE username = ?")
            .bind(online)
            .bind(username)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Update the last-activity timestamp, used to order the roster
    pub async fn touch_activity(
        pool: &DbPool,
        username: &str,
        timestamp: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_activity = ? WHERE username = ?")
            .bind(timestamp)
            .bind(username)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// All known users, most recently active first, never-chatted last
    pub async fn roster(pool: &DbPool) -> Result<Vec<User>, sqlx::Error> {
        query_as::<_, User>(
            "SELECT * FROM users ORDER BY last_activity IS NULL, last_activity DESC, username",
        )
        .fetch_all(pool)
        .await
    }
}

pub struct MessageRepository;

impl MessageRepository {
    /// Persist a message with its server-assigned timestamp
    pub async fn insert(
        pool: &DbPool,
        sender: &str,
        recipient: &str,
        body: &str,
        kind: &str,
        timestamp: &str,
    ) -> Result<MessageRecord, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO messages (sender, recipient, body, kind, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(sender)
        .bind(recipient)
        .bind(body)
        .bind(kind)
        .bind(timestamp)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();

        query_as::<_, MessageRecord>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// All messages between an unordered pair of participants, oldest first
    pub async fn history_between(
        pool: &DbPool,
        a: &str,
        b: &str,
    ) -> Result<Vec<MessageRecord>, sqlx::Error> {
        query_as::<_, MessageRecord>(
            r#"
            SELECT * FROM messages
            WHERE (sender = ? AND recipient = ?) OR (sender = ? AND recipient = ?)
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(pool)
        .await
    }
}
