//! Contract for the remote, path-addressed store the client caches over.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("blob upload rejected for {path}: {reason}")]
    UploadRejected { path: String, reason: String },
    #[error("no download url for {0}")]
    DownloadUrlUnavailable(String),
}

impl From<GatewayError> for SyncError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Unavailable(reason) => SyncError::SyncUnavailable(reason),
            GatewayError::UploadRejected { path, reason } => {
                SyncError::UploadFailed(format!("{path}: {reason}"))
            }
            GatewayError::DownloadUrlUnavailable(path) => SyncError::DownloadUrlUnavailable(path),
        }
    }
}

/// A key-value document store with path-addressed reads and writes, atomic
/// list appends and blob storage.
///
/// `get` returns `Ok(None)` for a path that holds nothing; absence is never
/// an error. A path written with `append` reads back as a JSON array in
/// append order.
#[async_trait]
pub trait SyncGateway: Send + Sync {
    async fn put(&self, path: &str, value: Value) -> Result<(), GatewayError>;
    async fn get(&self, path: &str) -> Result<Option<Value>, GatewayError>;
    async fn append(&self, path: &str, value: Value) -> Result<(), GatewayError>;
    async fn upload_blob(&self, path: &str, bytes: Vec<u8>) -> Result<String, GatewayError>;
    async fn download_url(&self, path: &str) -> Result<String, GatewayError>;
}

/// Gateway used when no backend is configured; every call fails.
pub struct UnavailableGateway;

#[async_trait]
impl SyncGateway for UnavailableGateway {
    async fn put(&self, path: &str, _value: Value) -> Result<(), GatewayError> {
        Err(GatewayError::Unavailable(format!("cannot write {path}: no backend")))
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, GatewayError> {
        Err(GatewayError::Unavailable(format!("cannot read {path}: no backend")))
    }

    async fn append(&self, path: &str, _value: Value) -> Result<(), GatewayError> {
        Err(GatewayError::Unavailable(format!("cannot append to {path}: no backend")))
    }

    async fn upload_blob(&self, path: &str, _bytes: Vec<u8>) -> Result<String, GatewayError> {
        Err(GatewayError::UploadRejected {
            path: path.to_string(),
            reason: "no backend".to_string(),
        })
    }

    async fn download_url(&self, path: &str) -> Result<String, GatewayError> {
        Err(GatewayError::DownloadUrlUnavailable(path.to_string()))
    }
}
