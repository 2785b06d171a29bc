use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{domain::Identity, error::SyncError};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    identity: Identity,
    signed_in_at: DateTime<Utc>,
}

/// Holds the signed-in identity, optionally mirrored to a JSON file so a
/// session survives restarts.
pub struct SessionStore {
    path: Option<PathBuf>,
    current: RwLock<Option<Identity>>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// Opens the store backed by `<data_dir>/session.json`, restoring a
    /// previous session when the file is readable. A corrupt file is
    /// ignored and the store starts signed out.
    pub async fn open(data_dir: &Path) -> Result<Self, SyncError> {
        tokio::fs::create_dir_all(data_dir).await.map_err(|err| {
            SyncError::LocalStorage(format!(
                "failed to create data directory '{}': {err}",
                data_dir.display()
            ))
        })?;

        let path = data_dir.join(SESSION_FILE_NAME);
        let restored = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<SessionFile>(&raw) {
                Ok(file) => {
                    info!(identity = %file.identity, "restored session");
                    Some(file.identity)
                }
                Err(err) => {
                    warn!(path = %path.display(), "ignoring unreadable session file: {err}");
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(SyncError::LocalStorage(format!(
                    "failed to read '{}': {err}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(restored),
        })
    }

    pub async fn set_identity(&self, raw_account_identifier: &str) -> Result<Identity, SyncError> {
        let identity = Identity::parse(raw_account_identifier)?;

        if let Some(path) = &self.path {
            let file = SessionFile {
                identity: identity.clone(),
                signed_in_at: Utc::now(),
            };
            let encoded = serde_json::to_vec_pretty(&file)
                .map_err(|err| SyncError::LocalStorage(err.to_string()))?;
            tokio::fs::write(path, encoded).await.map_err(|err| {
                SyncError::LocalStorage(format!("failed to write '{}': {err}", path.display()))
            })?;
        }

        *self.current.write().await = Some(identity.clone());
        Ok(identity)
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.current.read().await.clone()
    }

    pub async fn require_identity(&self) -> Result<Identity, SyncError> {
        self.current_identity().await.ok_or(SyncError::NotSignedIn)
    }

    pub async fn clear(&self) -> Result<(), SyncError> {
        *self.current.write().await = None;

        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(SyncError::LocalStorage(format!(
                        "failed to remove '{}': {err}",
                        path.display()
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
