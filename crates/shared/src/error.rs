use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidIdentity,
    Validation,
    UnknownAccount,
    NotSignedIn,
    SyncUnavailable,
    UploadFailed,
    DownloadUrlUnavailable,
    DuplicateMessageId,
    LocalStorage,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("no account registered for {0}")]
    UnknownAccount(String),
    #[error("no identity is signed in")]
    NotSignedIn,
    #[error("sync unavailable: {0}")]
    SyncUnavailable(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("download url unavailable: {0}")]
    DownloadUrlUnavailable(String),
    #[error("message id {0} already exists in this conversation")]
    DuplicateMessageId(MessageId),
    #[error("local storage failure: {0}")]
    LocalStorage(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out after {0} ms")]
    TimedOut(u64),
}

impl SyncError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidIdentity(_) => ErrorCode::InvalidIdentity,
            Self::Validation(_) => ErrorCode::Validation,
            Self::UnknownAccount(_) => ErrorCode::UnknownAccount,
            Self::NotSignedIn => ErrorCode::NotSignedIn,
            Self::SyncUnavailable(_) => ErrorCode::SyncUnavailable,
            Self::UploadFailed(_) => ErrorCode::UploadFailed,
            Self::DownloadUrlUnavailable(_) => ErrorCode::DownloadUrlUnavailable,
            Self::DuplicateMessageId(_) => ErrorCode::DuplicateMessageId,
            Self::LocalStorage(_) => ErrorCode::LocalStorage,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::TimedOut(_) => ErrorCode::TimedOut,
        }
    }

    /// Whether the caller can reasonably retry or reprompt. A duplicate
    /// message id is a client bug, not a condition to retry through.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::DuplicateMessageId(_))
    }
}

/// Serializable form of a [`SyncError`] handed to presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&SyncError> for ErrorReport {
    fn from(value: &SyncError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<SyncError> for ErrorReport {
    fn from(value: SyncError) -> Self {
        Self::from(&value)
    }
}
