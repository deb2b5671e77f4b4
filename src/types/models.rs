use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AccessLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub authorized_by_idp: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: i64,
    pub path: String,
    pub description: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields of an operation before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub path: String,
    pub description: String,
    pub category: String,
    pub last_used: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub user_id: i64,
    pub op_id: i64,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub id: i64,
    pub op_id: i64,
    pub user_id: i64,
    pub commit_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    System,
    Image,
    Document,
}

impl MessageType {
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            MessageType::Text => 0,
            MessageType::System => 1,
            MessageType::Image => 2,
            MessageType::Document => 3,
        }
    }

    #[must_use]
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(MessageType::Text),
            1 => Some(MessageType::System),
            2 => Some(MessageType::Image),
            3 => Some(MessageType::Document),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub op_id: i64,
    pub user_id: i64,
    pub text: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Summary returned by `get_operation_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDetails {
    pub id: i64,
    pub path: String,
    pub description: String,
    pub category: String,
    pub active: bool,
}

/// One row of a user's operation list.
#[derive(Debug, Clone, Serialize)]
pub struct OperationListing {
    pub op_id: i64,
    pub access_level: AccessLevel,
    pub path: String,
    pub description: String,
    pub category: String,
    pub active: bool,
}

/// A change joined with the username of its author, newest first in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSummary {
    pub id: i64,
    pub comment: Option<String>,
    pub version_name: Option<String>,
    pub username: String,
    pub commit_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedUser {
    pub username: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRef {
    pub id: i64,
    pub username: String,
    pub access_level: AccessLevel,
}
