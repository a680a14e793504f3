use crate::database::{repository::UserRepository, DbPool};
use axum::{extract::State, http::StatusCode, Json};
use shared::{ErrorResponse, RosterEntry};
use tracing::error;

/// Roster handler - every known user with online status and recency,
/// most recently active first, never-chatted last
pub async fn roster(
    State(pool): State<DbPool>,
) -> Result<Json<Vec<RosterEntry>>, (StatusCode, Json<ErrorResponse>)> {
    let users = UserRepository::roster(&pool).await.map_err(|e| {
        error!("[USERS] roster query failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Database error".to_string(),
            }),
        )
    })?;

    let entries = users
        .into_iter()
        .map(|user| RosterEntry {
            username: user.username,
            online: user.online,
            last_activity: user.last_activity,
        })
        .collect();

    Ok(Json(entries))
}
