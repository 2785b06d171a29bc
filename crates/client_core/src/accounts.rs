use std::sync::Arc;

use shared::{
    domain::{AccountRecord, Identity, SearchableUser},
    error::SyncError,
    gateway::SyncGateway,
    protocol::{decode, encode, paths},
};
use tracing::{info, warn};

use crate::{
    directory::UserDirectory,
    events::{ClientEvent, EventBus},
    media::Media,
    session::SessionStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewAccount {
    fn validate(&self) -> Result<Identity, SyncError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(SyncError::Validation(
                "first and last name are required".to_string(),
            ));
        }
        Identity::parse(&self.email)
    }
}

/// Outcome of a registration. The profile picture upload is independent:
/// `profile_picture` carries its own result and never fails the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity: Identity,
    pub profile_picture: Option<Result<String, SyncError>>,
}

pub struct Accounts {
    gateway: Arc<dyn SyncGateway>,
    session: Arc<SessionStore>,
    directory: Arc<UserDirectory>,
    media: Arc<Media>,
    events: EventBus,
}

impl Accounts {
    pub fn new(
        gateway: Arc<dyn SyncGateway>,
        session: Arc<SessionStore>,
        directory: Arc<UserDirectory>,
        media: Arc<Media>,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            session,
            directory,
            media,
            events,
        }
    }

    pub async fn user_exists(&self, raw_email: &str) -> Result<bool, SyncError> {
        let identity = Identity::parse(raw_email)?;
        Ok(self.profile(&identity).await?.is_some())
    }

    pub async fn profile(&self, identity: &Identity) -> Result<Option<AccountRecord>, SyncError> {
        let path = paths::account(identity);
        match self.gateway.get(&path).await? {
            Some(value) => Ok(Some(decode(&path, value)?)),
            None => Ok(None),
        }
    }

    pub async fn register(
        &self,
        account: NewAccount,
        profile_picture: Option<Vec<u8>>,
    ) -> Result<Registration, SyncError> {
        let identity = account.validate()?;
        if self.profile(&identity).await?.is_some() {
            return Err(SyncError::Validation(format!(
                "an account for {} already exists",
                account.email.trim()
            )));
        }

        let record = AccountRecord {
            first_name: account.first_name.trim().to_string(),
            last_name: account.last_name.trim().to_string(),
        };
        let path = paths::account(&identity);
        self.gateway.put(&path, encode(&path, &record)?).await?;
        self.directory
            .register(SearchableUser {
                name: record.display_name(),
                email: identity.clone(),
            })
            .await?;

        self.session.set_identity(identity.as_str()).await?;
        info!(identity = %identity, "account registered");
        self.events.emit(ClientEvent::SignedIn(identity.clone()));

        let profile_picture = match profile_picture {
            Some(bytes) => {
                let outcome = self.media.upload_profile_picture(&identity, bytes).await;
                match &outcome {
                    Ok(url) => self.events.emit(ClientEvent::ProfilePictureUploaded {
                        identity: identity.clone(),
                        url: url.clone(),
                    }),
                    Err(err) => warn!(identity = %identity, "profile picture not stored: {err}"),
                }
                Some(outcome)
            }
            None => None,
        };

        Ok(Registration {
            identity,
            profile_picture,
        })
    }

    pub async fn sign_in(&self, raw_email: &str) -> Result<Identity, SyncError> {
        let identity = Identity::parse(raw_email)?;
        if self.profile(&identity).await?.is_none() {
            return Err(SyncError::UnknownAccount(raw_email.trim().to_string()));
        }
        self.session.set_identity(identity.as_str()).await?;
        info!(identity = %identity, "signed in");
        self.events.emit(ClientEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.session.clear().await?;
        self.events.emit(ClientEvent::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/accounts_tests.rs"]
mod tests;
