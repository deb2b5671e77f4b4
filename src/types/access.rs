use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Role a user holds on an operation.
///
/// The levels are not a single linear rank: creator and admin share the
/// management privileges, collaborators may edit and label history, viewers
/// only read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Creator,
    Admin,
    Collaborator,
    Viewer,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::Creator,
        AccessLevel::Admin,
        AccessLevel::Collaborator,
        AccessLevel::Viewer,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Creator => "creator",
            AccessLevel::Admin => "admin",
            AccessLevel::Collaborator => "collaborator",
            AccessLevel::Viewer => "viewer",
        }
    }

    /// Converts a level string to its enum value.
    pub fn parse(s: &str) -> Option<AccessLevel> {
        match s {
            "creator" => Some(AccessLevel::Creator),
            "admin" => Some(AccessLevel::Admin),
            "collaborator" => Some(AccessLevel::Collaborator),
            "viewer" => Some(AccessLevel::Viewer),
            _ => None,
        }
    }

    /// Creator or admin: may manage members and operation metadata.
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, AccessLevel::Creator | AccessLevel::Admin)
    }

    /// Creator, admin or collaborator: may label and restore history.
    #[must_use]
    pub const fn can_edit(self) -> bool {
        !matches!(self, AccessLevel::Viewer)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidAccessLevel(s.to_string()))
    }
}

impl ToSql for AccessLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccessLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        AccessLevel::parse(s)
            .ok_or_else(|| FromSqlError::Other(Box::new(Error::InvalidAccessLevel(s.to_string()))))
    }
}
