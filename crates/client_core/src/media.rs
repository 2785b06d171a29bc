use std::sync::Arc;

use shared::{
    domain::Identity,
    error::SyncError,
    gateway::{GatewayError, SyncGateway},
    protocol::paths,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Blob uploads. Failures are reported once; nothing is retried here.
pub struct Media {
    gateway: Arc<dyn SyncGateway>,
}

impl Media {
    pub fn new(gateway: Arc<dyn SyncGateway>) -> Self {
        Self { gateway }
    }

    pub async fn upload_profile_picture(
        &self,
        identity: &Identity,
        bytes: Vec<u8>,
    ) -> Result<String, SyncError> {
        let path = paths::profile_picture(identity);
        self.upload(&path, bytes).await
    }

    pub async fn upload_message_photo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, SyncError> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_name.contains('/') {
            return Err(SyncError::Validation(format!(
                "invalid photo file name {file_name:?}"
            )));
        }
        self.upload(&paths::message_image(file_name), bytes).await
    }

    pub async fn download_url(&self, path: &str) -> Result<String, SyncError> {
        self.gateway.download_url(path).await.map_err(|err| match err {
            GatewayError::Unavailable(reason) => SyncError::DownloadUrlUnavailable(reason),
            other => other.into(),
        })
    }

    pub async fn profile_picture_url(&self, identity: &Identity) -> Result<String, SyncError> {
        self.download_url(&paths::profile_picture(identity)).await
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, SyncError> {
        let size = bytes.len();
        match self.gateway.upload_blob(path, bytes).await {
            Ok(url) => {
                info!(path, size, "blob uploaded");
                Ok(url)
            }
            Err(err) => {
                warn!(path, size, "blob upload failed: {err}");
                Err(match err {
                    GatewayError::Unavailable(reason) => SyncError::UploadFailed(reason),
                    other => other.into(),
                })
            }
        }
    }
}

pub fn new_photo_file_name() -> String {
    format!("photo_message_{}.png", Uuid::new_v4())
}

#[cfg(test)]
#[path = "tests/media_tests.rs"]
mod tests;
