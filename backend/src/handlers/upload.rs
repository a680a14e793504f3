use crate::error::AppError;
use crate::uploads::{is_allowed_content_type, BlobStore};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use shared::{ErrorResponse, UploadResponse};
use std::sync::Arc;
use tracing::{info, warn};

fn reject(status: StatusCode, error: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Upload handler - accepts one `file` multipart field, validates content
/// type and size before anything is persisted, and returns the blob
/// reference clients attach to media messages.
pub async fn upload(
    State(store): State<Arc<BlobStore>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), (StatusCode, Json<ErrorResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "Malformed multipart body"))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();

        // Reject before buffering anything we already know is bad
        if !is_allowed_content_type(&content_type) {
            warn!("[UPLOAD] rejected content type: {}", content_type);
            return Err(reject(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Unsupported content type",
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|_| reject(StatusCode::BAD_REQUEST, "Failed to read upload body"))?;

        let blob = match store.store(&name, &content_type, &data).await {
            Ok(blob) => blob,
            Err(AppError::BlobTooLarge { size, max }) => {
                warn!("[UPLOAD] oversize upload: {} bytes (max {})", size, max);
                return Err(reject(StatusCode::PAYLOAD_TOO_LARGE, "Upload too large"));
            }
            Err(AppError::Upload(reason)) => {
                warn!("[UPLOAD] rejected: {}", reason);
                return Err(reject(StatusCode::BAD_REQUEST, &reason));
            }
            Err(e) => {
                tracing::error!("[UPLOAD] storage failure: {}", e);
                return Err(reject(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to store upload",
                ));
            }
        };

        info!(
            "[UPLOAD] stored {} ({} bytes) as {}",
            blob.name, blob.size, blob.url
        );

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: blob.url,
                name: blob.name,
                content_type: blob.content_type,
                size: blob.size,
            }),
        ));
    }

    Err(reject(StatusCode::BAD_REQUEST, "Missing file field"))
}
