use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::SearchableUser,
    error::SyncError,
    gateway::SyncGateway,
    protocol::{decode_list, encode, paths},
};
use tokio::sync::RwLock;
use tracing::debug;

/// Case-insensitive name-prefix match. A query that is only whitespace
/// matches nothing.
pub fn filter_users(users: &[SearchableUser], query: &str) -> Vec<SearchableUser> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let term = query.trim().to_lowercase();
    users
        .iter()
        .filter(|user| user.name.to_lowercase().starts_with(&term))
        .cloned()
        .collect()
}

/// The shared `users` list used to find conversation partners.
pub struct UserDirectory {
    gateway: Arc<dyn SyncGateway>,
    cache: RwLock<Option<Vec<SearchableUser>>>,
}

impl UserDirectory {
    pub fn new(gateway: Arc<dyn SyncGateway>) -> Self {
        Self {
            gateway,
            cache: RwLock::new(None),
        }
    }

    pub async fn register(&self, user: SearchableUser) -> Result<(), SyncError> {
        let value = encode(paths::USERS, &user)?;
        self.gateway.append(paths::USERS, value).await?;

        if let Some(cached) = self.cache.write().await.as_mut() {
            if !cached.iter().any(|u| u.email == user.email) {
                cached.push(user);
            }
        }
        Ok(())
    }

    /// Reads the whole directory and replaces the cache. Repeated entries
    /// for one identity keep the first.
    pub async fn all(&self) -> Result<Vec<SearchableUser>, SyncError> {
        let entries: Vec<SearchableUser> =
            decode_list(paths::USERS, self.gateway.get(paths::USERS).await?)?;
        let mut seen = HashSet::with_capacity(entries.len());
        let users: Vec<_> = entries
            .into_iter()
            .filter(|user| seen.insert(user.email.clone()))
            .collect();
        debug!(count = users.len(), "user directory fetched");
        *self.cache.write().await = Some(users.clone());
        Ok(users)
    }

    /// Filters the directory, fetching it on first use only.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchableUser>, SyncError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let cached = self.cache.read().await.clone();
        let users = match cached {
            Some(users) => users,
            None => self.all().await?,
        };
        Ok(filter_users(&users, query))
    }

    pub async fn refresh(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
