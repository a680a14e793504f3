//! # Blob Store
//!
//! Local-disk storage for uploaded media. Content type and size are
//! validated before anything touches the disk; accepted blobs get a uuid
//! filename under the upload directory and are served back via the
//! `/uploads` static route.

use crate::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Content types the upload collaborator accepts: images, audio, video,
/// and a small set of document types. Everything else is rejected before
/// persistence.
pub fn is_allowed_content_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type.starts_with("audio/")
        || content_type.starts_with("video/")
        || matches!(
            content_type,
            "application/pdf"
                | "application/msword"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "text/plain"
        )
}

/// A stored blob reference plus the original metadata echoed back to the
/// uploading client.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub url: String,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, AppError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            AppError::Internal(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "blob store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validate and persist one upload. Returns the retrievable reference
    /// plus the original metadata.
    pub async fn store(
        &self,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredBlob, AppError> {
        if !is_allowed_content_type(content_type) {
            return Err(AppError::Upload(format!(
                "unsupported content type: {content_type}"
            )));
        }
        if data.is_empty() {
            return Err(AppError::Upload("empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(AppError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let filename = match sanitized_extension(original_name) {
            Some(ext) => format!("{id}.{ext}"),
            None => id.to_string(),
        };
        let path = self.base_path.join(&filename);

        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write blob {id}: {e}")))?;

        debug!(id = %id, size = data.len(), content_type, "stored blob");

        Ok(StoredBlob {
            url: format!("/uploads/{filename}"),
            name: original_name.to_string(),
            content_type: content_type.to_string(),
            size: data.len() as u64,
        })
    }
}

/// Extension taken from the client-supplied filename, restricted to a
/// short alphanumeric token so the stored filename stays path-safe.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}
