use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        Conversation, ConversationId, Identity, LatestMessage, Message, MessageContent, MessageId,
    },
    error::SyncError,
};

/// Gateway path layout.
pub mod paths {
    use crate::domain::{ConversationId, Identity};

    pub const USERS: &str = "users";

    pub fn account(identity: &Identity) -> String {
        identity.as_str().to_string()
    }

    pub fn conversation_index(identity: &Identity) -> String {
        format!("{identity}/conversations")
    }

    pub fn conversation_summary(identity: &Identity, conversation_id: &ConversationId) -> String {
        format!("{identity}/conversations/{conversation_id}")
    }

    pub fn messages(conversation_id: &ConversationId) -> String {
        format!("conversations/{conversation_id}/messages")
    }

    pub fn profile_picture(identity: &Identity) -> String {
        format!("images/{}", identity.profile_picture_file_name())
    }

    pub fn message_image(file_name: &str) -> String {
        format!("message_images/{file_name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestMessageRecord {
    pub date: DateTime<Utc>,
    pub message: String,
    pub is_read: bool,
}

/// Conversation summary as stored under one participant's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub other_user_email: Identity,
    pub name: String,
    pub latest_message: LatestMessageRecord,
}

impl From<&Conversation> for ConversationRecord {
    fn from(value: &Conversation) -> Self {
        Self {
            id: value.id.clone(),
            other_user_email: value.participant.clone(),
            name: value.display_name.clone(),
            latest_message: LatestMessageRecord {
                date: value.latest_message.timestamp,
                message: value.latest_message.text.clone(),
                is_read: value.latest_message.is_read,
            },
        }
    }
}

impl From<ConversationRecord> for Conversation {
    fn from(value: ConversationRecord) -> Self {
        Self {
            id: value.id,
            participant: value.other_user_email,
            display_name: value.name,
            latest_message: LatestMessage {
                timestamp: value.latest_message.date,
                text: value.latest_message.message,
                is_read: value.latest_message.is_read,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_email: Identity,
    pub date: DateTime<Utc>,
    pub body: MessageContent,
}

impl From<&Message> for MessageRecord {
    fn from(value: &Message) -> Self {
        Self {
            id: value.id.clone(),
            sender_email: value.sender.clone(),
            date: value.timestamp,
            body: value.content.clone(),
        }
    }
}

impl From<MessageRecord> for Message {
    fn from(value: MessageRecord) -> Self {
        Self {
            id: value.id,
            sender: value.sender_email,
            timestamp: value.date,
            content: value.body,
        }
    }
}

pub fn encode<T: Serialize>(path: &str, record: &T) -> Result<Value, SyncError> {
    serde_json::to_value(record)
        .map_err(|err| SyncError::SyncUnavailable(format!("failed to encode {path}: {err}")))
}

pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, SyncError> {
    serde_json::from_value(value)
        .map_err(|err| SyncError::SyncUnavailable(format!("malformed record at {path}: {err}")))
}

/// Decodes a list path. A missing or null value is an empty list.
pub fn decode_list<T: DeserializeOwned>(
    path: &str,
    value: Option<Value>,
) -> Result<Vec<T>, SyncError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.into_iter().map(|item| decode(path, item)).collect(),
        Some(other) => Err(SyncError::SyncUnavailable(format!(
            "expected a list at {path}, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
