use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use serde_json::Value;
use shared::gateway::{GatewayError, SyncGateway};
use tokio::sync::Mutex;

/// In-process gateway with switchable failures.
#[derive(Default)]
pub struct MemoryGateway {
    documents: Mutex<HashMap<String, Value>>,
    lists: Mutex<HashMap<String, Vec<Value>>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_uploads: AtomicBool,
    failing_prefix: std::sync::Mutex<Option<String>>,
    reads: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Refuses writes to paths starting with `prefix`; `None` lifts it.
    pub fn fail_writes_under(&self, prefix: Option<&str>) {
        *self.failing_prefix.lock().expect("prefix lock") = prefix.map(str::to_string);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub async fn document(&self, path: &str) -> Option<Value> {
        self.documents.lock().await.get(path).cloned()
    }

    pub async fn list(&self, path: &str) -> Vec<Value> {
        self.lists.lock().await.get(path).cloned().unwrap_or_default()
    }

    pub async fn blob(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(path).cloned()
    }

    fn check_writes(&self, path: &str) -> Result<(), GatewayError> {
        let prefix_refused = self
            .failing_prefix
            .lock()
            .expect("prefix lock")
            .as_deref()
            .is_some_and(|prefix| path.starts_with(prefix));
        if self.fail_writes.load(Ordering::SeqCst) || prefix_refused {
            return Err(GatewayError::Unavailable(format!("write to {path} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncGateway for MemoryGateway {
    async fn put(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        self.check_writes(path)?;
        self.lists.lock().await.remove(path);
        self.documents.lock().await.insert(path.to_string(), value);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, GatewayError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(format!("read of {path} refused")));
        }
        if let Some(document) = self.documents.lock().await.get(path) {
            return Ok(Some(document.clone()));
        }
        Ok(self
            .lists
            .lock()
            .await
            .get(path)
            .map(|items| Value::Array(items.clone())))
    }

    async fn append(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        self.check_writes(path)?;
        self.lists
            .lock()
            .await
            .entry(path.to_string())
            .or_default()
            .push(value);
        Ok(())
    }

    async fn upload_blob(&self, path: &str, bytes: Vec<u8>) -> Result<String, GatewayError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(GatewayError::UploadRejected {
                path: path.to_string(),
                reason: "storage quota exceeded".to_string(),
            });
        }
        self.blobs.lock().await.insert(path.to_string(), bytes);
        Ok(format!("memory://{path}"))
    }

    async fn download_url(&self, path: &str) -> Result<String, GatewayError> {
        if self.blobs.lock().await.contains_key(path) {
            Ok(format!("memory://{path}"))
        } else {
            Err(GatewayError::DownloadUrlUnavailable(path.to_string()))
        }
    }
}

pub fn identity(raw: &str) -> shared::domain::Identity {
    shared::domain::Identity::parse(raw).expect("identity")
}
