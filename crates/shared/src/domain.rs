use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ConversationId);
id_newtype!(MessageId);

/// Normalized account key, safe to use as a storage path segment.
///
/// Built only through [`Identity::parse`] (or deserialization, which runs the
/// same normalization), so every value held by the client is already
/// normalized and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let key = normalize(raw);
        if key.is_empty() {
            return Err(SyncError::InvalidIdentity(raw.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn profile_picture_file_name(&self) -> String {
        format!("{}_profile_picture.png", self.0)
    }
}

/// Characters replaced by `-` so an identity stays a single path segment.
pub const RESERVED_PATH_CHARS: [char; 8] = ['.', '@', '/', '\\', '#', '$', '[', ']'];

/// Trims, lowercases and replaces [`RESERVED_PATH_CHARS`]. Idempotent: the
/// output contains none of them and no surrounding whitespace.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if RESERVED_PATH_CHARS.contains(&c) {
                '-'
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

impl TryFrom<String> for Identity {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Location,
    Audio,
    Contact,
    LinkPreview,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationItem {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioItem {
    pub url: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactItem {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Message body: the kind tag and its payload travel together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    Image(MediaItem),
    Video(MediaItem),
    Location(LocationItem),
    Audio(AudioItem),
    Contact(ContactItem),
    LinkPreview(LinkItem),
    Custom(serde_json::Value),
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Image(_) => MessageKind::Image,
            Self::Video(_) => MessageKind::Video,
            Self::Location(_) => MessageKind::Location,
            Self::Audio(_) => MessageKind::Audio,
            Self::Contact(_) => MessageKind::Contact,
            Self::LinkPreview(_) => MessageKind::LinkPreview,
            Self::Custom(_) => MessageKind::Custom,
        }
    }

    /// One-line text shown in the conversation list.
    pub fn summary(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image(_) => "[image]".to_string(),
            Self::Video(_) => "[video]".to_string(),
            Self::Location(_) => "[location]".to_string(),
            Self::Audio(_) => "[audio]".to_string(),
            Self::Contact(contact) => format!("[contact] {}", contact.display_name),
            Self::LinkPreview(link) => link.url.clone(),
            Self::Custom(_) => "[custom]".to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Image(item) | Self::Video(item) => item.url.trim().is_empty(),
            Self::Audio(item) => item.url.trim().is_empty(),
            Self::LinkPreview(link) => link.url.trim().is_empty(),
            Self::Location(_) | Self::Contact(_) | Self::Custom(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Identity,
    pub timestamp: DateTime<Utc>,
    pub content: MessageContent,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participant: Identity,
    pub display_name: String,
    pub latest_message: LatestMessage,
}

/// A conversation with a partner that has no messages yet, and so no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConversation {
    pub participant: Identity,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationRef {
    Existing(Conversation),
    Pending(PendingConversation),
}

impl ConversationRef {
    pub fn id(&self) -> Option<&ConversationId> {
        match self {
            Self::Existing(conversation) => Some(&conversation.id),
            Self::Pending(_) => None,
        }
    }

    pub fn participant(&self) -> &Identity {
        match self {
            Self::Existing(conversation) => &conversation.participant,
            Self::Pending(pending) => &pending.participant,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Existing(conversation) => &conversation.display_name,
            Self::Pending(pending) => &pending.display_name,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableUser {
    pub name: String,
    pub email: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub first_name: String,
    pub last_name: String,
}

impl AccountRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
