use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::gateway::{GatewayError, SyncGateway};

pub const DEFAULT_BLOB_BASE_URL: &str = "blob://local";

/// SQLite-backed gateway: JSON documents, append-only lists and blobs, all
/// addressed by path.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    blob_base_url: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            blob_base_url: DEFAULT_BLOB_BASE_URL.to_string(),
        })
    }

    pub fn with_blob_base_url(mut self, blob_base_url: impl Into<String>) -> Self {
        self.blob_base_url = blob_base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn blob_url(&self, path: &str) -> String {
        format!("{}/{}", self.blob_base_url, path.trim_start_matches('/'))
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Replaces whatever lives at `path`, list entries included.
    pub async fn put_document(&self, path: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM list_entries WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO documents (path, value) VALUES (?, ?)
             ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(path)
        .bind(encoded)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_document(&self, path: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| parse_value(path, &r.get::<String, _>(0)))
            .transpose()
    }

    /// Appends one entry to the list at `path` in a single transaction and
    /// returns its sequence number. An array document previously written to
    /// the same path with `put_document` is converted into list entries first.
    pub async fn append_entry(&self, path: &str, value: &Value) -> Result<i64> {
        let encoded = serde_json::to_string(value)?;
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT value FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = existing {
            let Value::Array(items) = parse_value(path, &row.get::<String, _>(0))? else {
                return Err(anyhow!("cannot append to non-list document at '{path}'"));
            };
            for item in items {
                sqlx::query("INSERT INTO list_entries (path, value) VALUES (?, ?)")
                    .bind(path)
                    .bind(serde_json::to_string(&item)?)
                    .execute(&mut *tx)
                    .await?;
            }
            sqlx::query("DELETE FROM documents WHERE path = ?")
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }

        let rec = sqlx::query("INSERT INTO list_entries (path, value) VALUES (?, ?) RETURNING seq")
            .bind(path)
            .bind(encoded)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn list_entries(&self, path: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query("SELECT value FROM list_entries WHERE path = ? ORDER BY seq ASC")
            .bind(path)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| parse_value(path, &r.get::<String, _>(0)))
            .collect()
    }

    pub async fn put_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO blobs (path, bytes, size_bytes) VALUES (?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET bytes = excluded.bytes, size_bytes = excluded.size_bytes",
        )
        .bind(path)
        .bind(bytes)
        .bind(i64::try_from(bytes.len()).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_blob(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT bytes FROM blobs WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>(0)))
    }

    pub async fn blob_exists(&self, path: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blobs WHERE path = ?")
            .bind(path)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl SyncGateway for Storage {
    async fn put(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        self.put_document(path, &value)
            .await
            .map_err(|err| unavailable("write", path, err))
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, GatewayError> {
        if let Some(document) = self
            .get_document(path)
            .await
            .map_err(|err| unavailable("read", path, err))?
        {
            return Ok(Some(document));
        }

        let entries = self
            .list_entries(path)
            .await
            .map_err(|err| unavailable("read", path, err))?;
        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Array(entries)))
        }
    }

    async fn append(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        self.append_entry(path, &value)
            .await
            .map(|_| ())
            .map_err(|err| unavailable("append to", path, err))
    }

    async fn upload_blob(&self, path: &str, bytes: Vec<u8>) -> Result<String, GatewayError> {
        if bytes.is_empty() {
            return Err(GatewayError::UploadRejected {
                path: path.to_string(),
                reason: "empty blob".to_string(),
            });
        }
        self.put_blob(path, &bytes)
            .await
            .map_err(|err| GatewayError::UploadRejected {
                path: path.to_string(),
                reason: format!("{err:#}"),
            })?;
        Ok(self.blob_url(path))
    }

    async fn download_url(&self, path: &str) -> Result<String, GatewayError> {
        match self.blob_exists(path).await {
            Ok(true) => Ok(self.blob_url(path)),
            Ok(false) => Err(GatewayError::DownloadUrlUnavailable(path.to_string())),
            Err(err) => Err(unavailable("resolve", path, err)),
        }
    }
}

fn unavailable(action: &str, path: &str, err: anyhow::Error) -> GatewayError {
    GatewayError::Unavailable(format!("failed to {action} '{path}': {err:#}"))
}

fn parse_value(path: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("corrupt json stored at '{path}'"))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
