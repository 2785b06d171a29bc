use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{
        AccountRecord, Conversation, ConversationId, ConversationRef, Identity, LatestMessage,
        PendingConversation,
    },
    error::SyncError,
    gateway::SyncGateway,
    protocol::{decode, decode_list, encode, paths, ConversationRecord},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{ClientEvent, EventBus};

pub fn new_conversation_id() -> ConversationId {
    ConversationId(format!("conversation_{}", Uuid::new_v4()))
}

/// Where the first message of a pending conversation goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstMessageTarget {
    /// The partner stored a conversation with the owner in the meantime.
    Existing(Conversation),
    Reserved(ReservedConversation),
}

/// Id held for a pending conversation until its first message is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedConversation {
    pub id: ConversationId,
    /// How the partner sees the owner.
    pub owner_display_name: String,
}

struct PendingSlot {
    conversation: PendingConversation,
    reserved_id: Option<ConversationId>,
}

/// Newest first; equal timestamps fall back to id order so the listing is
/// stable across refreshes.
pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        b.latest_message
            .timestamp
            .cmp(&a.latest_message.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Cached view of one identity's conversations.
///
/// The gateway keeps an append-only list of conversation ids per identity
/// plus one summary document per conversation; `list` rebuilds the cache
/// from both on every call.
pub struct ConversationIndex {
    gateway: Arc<dyn SyncGateway>,
    events: EventBus,
    cache: RwLock<Vec<Conversation>>,
    pending: Mutex<HashMap<(Identity, Identity), PendingSlot>>,
}

impl ConversationIndex {
    pub fn new(gateway: Arc<dyn SyncGateway>, events: EventBus) -> Self {
        Self {
            gateway,
            events,
            cache: RwLock::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn list(&self, owner: &Identity) -> Result<Vec<Conversation>, SyncError> {
        let index_path = paths::conversation_index(owner);
        let ids: Vec<ConversationId> =
            decode_list(&index_path, self.gateway.get(&index_path).await?)?;

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            if conversations.iter().any(|c: &Conversation| c.id == id) {
                continue;
            }
            match self.fetch_summary(owner, &id).await? {
                Some(conversation) => conversations.push(conversation),
                None => warn!(owner = %owner, conversation_id = %id, "indexed conversation has no summary"),
            }
        }
        sort_conversations(&mut conversations);

        *self.cache.write().await = conversations.clone();
        self.events.emit(ClientEvent::ConversationsRefreshed {
            count: conversations.len(),
        });
        debug!(owner = %owner, count = conversations.len(), "conversation index refreshed");
        Ok(conversations)
    }

    /// Last snapshot returned by [`Self::list`], kept current by local sends.
    pub async fn cached(&self) -> Vec<Conversation> {
        self.cache.read().await.clone()
    }

    pub async fn find_or_create(
        &self,
        owner: &Identity,
        other: &Identity,
        display_name: &str,
    ) -> Result<ConversationRef, SyncError> {
        if owner == other {
            return Err(SyncError::Validation(
                "cannot start a conversation with yourself".to_string(),
            ));
        }

        let conversations = self.list(owner).await?;
        if let Some(existing) = conversations.into_iter().find(|c| &c.participant == other) {
            return Ok(ConversationRef::Existing(existing));
        }

        let mut pending = self.pending.lock().await;
        let slot = pending
            .entry((owner.clone(), other.clone()))
            .or_insert_with(|| PendingSlot {
                conversation: PendingConversation {
                    participant: other.clone(),
                    display_name: display_name.trim().to_string(),
                },
                reserved_id: None,
            });
        Ok(ConversationRef::Pending(slot.conversation.clone()))
    }

    /// Checks the owner's index again before a pending conversation gets its
    /// first message. Reads only; the reserved id stays the same across
    /// retries until [`Self::materialize`] succeeds.
    pub async fn resolve_pending(
        &self,
        owner: &Identity,
        pending: &PendingConversation,
    ) -> Result<FirstMessageTarget, SyncError> {
        let key = (owner.clone(), pending.participant.clone());
        let conversations = self.list(owner).await?;
        if let Some(existing) = conversations
            .into_iter()
            .find(|c| c.participant == pending.participant)
        {
            self.pending.lock().await.remove(&key);
            debug!(owner = %owner, conversation_id = %existing.id, "pending conversation already stored");
            return Ok(FirstMessageTarget::Existing(existing));
        }

        let owner_display_name = self.display_name_for(owner).await?;
        let mut slots = self.pending.lock().await;
        let slot = slots.entry(key).or_insert_with(|| PendingSlot {
            conversation: pending.clone(),
            reserved_id: None,
        });
        let id = slot
            .reserved_id
            .get_or_insert_with(new_conversation_id)
            .clone();
        Ok(FirstMessageTarget::Reserved(ReservedConversation {
            id,
            owner_display_name,
        }))
    }

    /// Display name recorded for `identity`, falling back to the key itself.
    pub async fn display_name_for(&self, identity: &Identity) -> Result<String, SyncError> {
        let path = paths::account(identity);
        let name = match self.gateway.get(&path).await? {
            Some(value) => {
                let record: AccountRecord = decode(&path, value)?;
                record.display_name()
            }
            None => String::new(),
        };
        if name.is_empty() {
            Ok(identity.to_string())
        } else {
            Ok(name)
        }
    }

    /// Stores a pending conversation for both participants. Only the owner
    /// side is required; a partner side that fails to store is recreated by
    /// the next [`Self::record_latest`].
    pub async fn materialize(
        &self,
        owner: &Identity,
        pending: &PendingConversation,
        reserved: &ReservedConversation,
        latest: LatestMessage,
    ) -> Result<Conversation, SyncError> {
        let id = reserved.id.clone();
        let owner_side = Conversation {
            id: id.clone(),
            participant: pending.participant.clone(),
            display_name: pending.display_name.clone(),
            latest_message: LatestMessage {
                is_read: true,
                ..latest.clone()
            },
        };
        self.register(owner, &owner_side).await?;

        let partner_side = Conversation {
            id: id.clone(),
            participant: owner.clone(),
            display_name: reserved.owner_display_name.clone(),
            latest_message: latest,
        };
        if let Err(err) = self.register(&pending.participant, &partner_side).await {
            warn!(partner = %pending.participant, conversation_id = %id, "partner side not stored: {err}");
        }

        self.pending
            .lock()
            .await
            .remove(&(owner.clone(), pending.participant.clone()));
        self.upsert_cached(owner_side.clone()).await;

        info!(owner = %owner, participant = %pending.participant, conversation_id = %id, "conversation created");
        self.events.emit(ClientEvent::ConversationCreated {
            conversation_id: id,
            participant: pending.participant.clone(),
        });
        Ok(owner_side)
    }

    /// Replaces the latest-message summary on both sides of `conversation`.
    /// A partner whose summary went missing gets it recreated.
    pub async fn record_latest(
        &self,
        owner: &Identity,
        conversation: &Conversation,
        latest: LatestMessage,
    ) -> Result<Conversation, SyncError> {
        let owner_side = Conversation {
            latest_message: LatestMessage {
                is_read: true,
                ..latest.clone()
            },
            ..conversation.clone()
        };
        self.write_summary(owner, &owner_side).await?;

        let partner = &conversation.participant;
        match self.fetch_summary(partner, &conversation.id).await? {
            Some(partner_side) => {
                let updated = Conversation {
                    latest_message: latest,
                    ..partner_side
                };
                self.write_summary(partner, &updated).await?;
            }
            None => {
                warn!(partner = %partner, conversation_id = %conversation.id, "partner summary missing; recreating");
                let recreated = Conversation {
                    id: conversation.id.clone(),
                    participant: owner.clone(),
                    display_name: self.display_name_for(owner).await?,
                    latest_message: latest,
                };
                self.register(partner, &recreated).await?;
            }
        }

        self.upsert_cached(owner_side.clone()).await;
        Ok(owner_side)
    }

    pub async fn mark_read(
        &self,
        owner: &Identity,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, SyncError> {
        let Some(mut conversation) = self.fetch_summary(owner, conversation_id).await? else {
            return Ok(None);
        };
        if !conversation.latest_message.is_read {
            conversation.latest_message.is_read = true;
            self.write_summary(owner, &conversation).await?;
        }
        self.upsert_cached(conversation.clone()).await;
        Ok(Some(conversation))
    }

    pub async fn reset(&self) {
        self.cache.write().await.clear();
        self.pending.lock().await.clear();
    }

    async fn register(&self, owner: &Identity, conversation: &Conversation) -> Result<(), SyncError> {
        // Index first: `list` skips an id without a summary, and the next
        // send writes the summary again.
        let index_path = paths::conversation_index(owner);
        self.gateway
            .append(&index_path, encode(&index_path, &conversation.id)?)
            .await?;
        self.write_summary(owner, conversation).await
    }

    async fn write_summary(
        &self,
        owner: &Identity,
        conversation: &Conversation,
    ) -> Result<(), SyncError> {
        let path = paths::conversation_summary(owner, &conversation.id);
        let record = ConversationRecord::from(conversation);
        self.gateway.put(&path, encode(&path, &record)?).await?;
        Ok(())
    }

    async fn fetch_summary(
        &self,
        owner: &Identity,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, SyncError> {
        let path = paths::conversation_summary(owner, conversation_id);
        match self.gateway.get(&path).await? {
            Some(value) => {
                let record: ConversationRecord = decode(&path, value)?;
                Ok(Some(record.into()))
            }
            None => Ok(None),
        }
    }

    async fn upsert_cached(&self, conversation: Conversation) {
        let mut cache = self.cache.write().await;
        cache.retain(|c| c.id != conversation.id);
        cache.push(conversation);
        sort_conversations(&mut cache);
    }
}

#[cfg(test)]
#[path = "tests/conversations_tests.rs"]
mod tests;
