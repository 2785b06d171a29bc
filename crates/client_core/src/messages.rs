use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, SecondsFormat, Utc};
use shared::{
    domain::{
        Conversation, ConversationId, ConversationRef, Identity, LatestMessage, Message,
        MessageContent, MessageId, PendingConversation,
    },
    error::SyncError,
    gateway::SyncGateway,
    protocol::{decode_list, encode, paths, MessageRecord},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    conversations::{ConversationIndex, FirstMessageTarget, ReservedConversation},
    events::{ClientEvent, EventBus},
};

/// `<recipient>_<sender>_<timestamp>`, timestamp in RFC 3339 with nanoseconds.
pub fn message_id(recipient: &Identity, sender: &Identity, timestamp: DateTime<Utc>) -> MessageId {
    MessageId(format!(
        "{recipient}_{sender}_{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
    ))
}

/// Sorts by `(timestamp, id)`. Repeated deliveries of one record collapse;
/// two different records sharing an id are a `DuplicateMessageId`.
pub fn order_messages(messages: Vec<Message>) -> Result<Vec<Message>, SyncError> {
    let mut messages = messages;
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut ordered: Vec<Message> = Vec::with_capacity(messages.len());
    let mut positions: HashMap<MessageId, usize> = HashMap::with_capacity(messages.len());
    for message in messages {
        match positions.get(&message.id) {
            Some(&at) if ordered[at] == message => {}
            Some(_) => return Err(SyncError::DuplicateMessageId(message.id)),
            None => {
                positions.insert(message.id.clone(), ordered.len());
                ordered.push(message);
            }
        }
    }
    Ok(ordered)
}

enum Destination<'a> {
    Existing(Conversation),
    New(&'a PendingConversation, ReservedConversation),
}

/// A stored message and the owner's view of its conversation afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub message: Message,
    pub conversation: Conversation,
}

#[derive(Default)]
struct LogState {
    last_issued: Option<DateTime<Utc>>,
    known_ids: HashMap<ConversationId, HashSet<MessageId>>,
    cache: HashMap<ConversationId, Vec<Message>>,
}

impl LogState {
    /// Strictly increasing across calls, so one log never stamps two
    /// messages with the same instant.
    fn next_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let issued = match self.last_issued {
            Some(previous) if now <= previous => previous + chrono::Duration::nanoseconds(1),
            _ => now,
        };
        self.last_issued = Some(issued);
        issued
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct MessageLog {
    gateway: Arc<dyn SyncGateway>,
    clock: Clock,
    conversations: Arc<ConversationIndex>,
    events: EventBus,
    state: Mutex<LogState>,
}

impl MessageLog {
    pub fn new(
        gateway: Arc<dyn SyncGateway>,
        conversations: Arc<ConversationIndex>,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            clock: Arc::new(Utc::now),
            conversations,
            events,
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Appends a message and refreshes the conversation's latest-message
    /// summary. A pending conversation is stored on its first message, or
    /// joined if the partner stored it first.
    pub async fn append(
        &self,
        conversation: &ConversationRef,
        sender: &Identity,
        content: MessageContent,
    ) -> Result<Appended, SyncError> {
        let recipient = conversation.participant();
        if recipient == sender {
            return Err(SyncError::Validation(
                "sender and recipient must differ".to_string(),
            ));
        }
        if content.is_blank() {
            return Err(SyncError::Validation("message is empty".to_string()));
        }

        let destination = match conversation {
            ConversationRef::Existing(existing) => Destination::Existing(existing.clone()),
            ConversationRef::Pending(pending) => {
                match self.conversations.resolve_pending(sender, pending).await? {
                    FirstMessageTarget::Existing(existing) => Destination::Existing(existing),
                    FirstMessageTarget::Reserved(reserved) => Destination::New(pending, reserved),
                }
            }
        };
        let conversation_id = match &destination {
            Destination::Existing(existing) => existing.id.clone(),
            Destination::New(_, reserved) => reserved.id.clone(),
        };

        let message = {
            let mut state = self.state.lock().await;
            let timestamp = state.next_timestamp((self.clock)());
            let id = message_id(recipient, sender, timestamp);
            if state
                .known_ids
                .get(&conversation_id)
                .is_some_and(|ids| ids.contains(&id))
            {
                return Err(SyncError::DuplicateMessageId(id));
            }
            Message {
                id,
                sender: sender.clone(),
                timestamp,
                content,
            }
        };

        // Other devices and earlier processes write to the same log.
        let log_path = paths::messages(&conversation_id);
        let stored: Vec<MessageRecord> =
            decode_list(&log_path, self.gateway.get(&log_path).await?)?;
        if stored.iter().any(|record| record.id == message.id) {
            warn!(conversation_id = %conversation_id, message_id = %message.id, "message id already stored");
            return Err(SyncError::DuplicateMessageId(message.id));
        }

        let record = MessageRecord::from(&message);
        self.gateway
            .append(&log_path, encode(&log_path, &record)?)
            .await?;

        {
            let mut state = self.state.lock().await;
            let known = state.known_ids.entry(conversation_id.clone()).or_default();
            known.extend(stored.into_iter().map(|record| record.id));
            known.insert(message.id.clone());
            if let Some(cached) = state.cache.get_mut(&conversation_id) {
                cached.push(message.clone());
            }
        }

        let latest = LatestMessage {
            timestamp: message.timestamp,
            text: message.content.summary(),
            is_read: false,
        };
        let stored_conversation = match destination {
            Destination::New(pending, reserved) => {
                self.conversations
                    .materialize(sender, pending, &reserved, latest)
                    .await?
            }
            Destination::Existing(existing) => {
                // The message is already in the log; a stale summary heals on
                // the next send.
                match self
                    .conversations
                    .record_latest(sender, &existing, latest.clone())
                    .await
                {
                    Ok(updated) => updated,
                    Err(err) => {
                        warn!(conversation_id = %existing.id, "failed to update latest message: {err}");
                        Conversation {
                            latest_message: LatestMessage {
                                is_read: true,
                                ..latest
                            },
                            ..existing
                        }
                    }
                }
            }
        };

        debug!(conversation_id = %conversation_id, message_id = %message.id, kind = ?message.kind(), "message appended");
        self.events.emit(ClientEvent::MessageAppended {
            conversation_id,
            message_id: message.id.clone(),
        });
        Ok(Appended {
            message,
            conversation: stored_conversation,
        })
    }

    /// Full history of `conversation`. A conversation without messages, or
    /// one that is still pending, yields an empty list.
    pub async fn fetch_all(&self, conversation: &ConversationRef) -> Result<Vec<Message>, SyncError> {
        let Some(conversation_id) = conversation.id() else {
            return Ok(Vec::new());
        };
        self.fetch_by_id(conversation_id).await
    }

    pub async fn fetch_for(&self, conversation: &Conversation) -> Result<Vec<Message>, SyncError> {
        self.fetch_by_id(&conversation.id).await
    }

    /// Messages held from the last fetch or local sends.
    pub async fn cached(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.state
            .lock()
            .await
            .cache
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.known_ids.clear();
        state.cache.clear();
    }

    async fn fetch_by_id(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, SyncError> {
        let log_path = paths::messages(conversation_id);
        let records: Vec<MessageRecord> =
            decode_list(&log_path, self.gateway.get(&log_path).await?)?;
        let fetched = records.len();
        let messages = order_messages(records.into_iter().map(Message::from).collect())
            .inspect_err(|err| warn!(conversation_id = %conversation_id, "conflicting messages in log: {err}"))?;
        if messages.len() != fetched {
            info!(conversation_id = %conversation_id, duplicates = fetched - messages.len(), "dropped duplicate deliveries");
        }

        let mut state = self.state.lock().await;
        state
            .known_ids
            .entry(conversation_id.clone())
            .or_default()
            .extend(messages.iter().map(|m| m.id.clone()));
        state.cache.insert(conversation_id.clone(), messages.clone());
        Ok(messages)
    }
}

#[cfg(test)]
#[path = "tests/messages_tests.rs"]
mod tests;
