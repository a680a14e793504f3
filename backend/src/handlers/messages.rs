use crate::database::{repository::MessageRepository, DbPool};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use shared::{ErrorResponse, HistoryMessage, HistoryParams, PayloadKind};
use tracing::error;

/// History handler - all messages between the unordered pair of
/// participants, oldest first. `?from=A&to=B` and `?from=B&to=A` return
/// the same records.
pub async fn history(
    State(pool): State<DbPool>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryMessage>>, (StatusCode, Json<ErrorResponse>)> {
    let records = MessageRepository::history_between(&pool, &params.from, &params.to)
        .await
        .map_err(|e| {
            error!("[HISTORY] query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Database error".to_string(),
                }),
            )
        })?;

    let messages = records
        .into_iter()
        .map(|record| HistoryMessage {
            from: record.sender,
            to: record.recipient,
            payload: record.body,
            kind: record.kind.parse().unwrap_or(PayloadKind::Text),
            timestamp: record.timestamp,
        })
        .collect();

    Ok(Json(messages))
}
