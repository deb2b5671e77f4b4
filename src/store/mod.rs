pub mod path;
mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// A set of permission mutations applied atomically.
///
/// Updates and deletes never touch `creator` rows; inserts fail the whole
/// batch when a row for the same `(user_id, op_id)` already exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionBatch {
    pub insert: Vec<Permission>,
    pub update: Vec<Permission>,
    pub delete: Vec<(i64, i64)>,
}

impl PermissionBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Store defines the metadata database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        authorized_by_idp: bool,
    ) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    /// Removes the user together with their permissions, changes and messages.
    /// Removes the account with its memberships and messages. Fails with
    /// [`crate::error::Error::Conflict`] while the user is a creator or has
    /// recorded changes.
    fn delete_user(&self, id: i64) -> Result<bool>;

    // Operation operations
    /// Inserts the operation and the creator's permission in one transaction.
    fn create_operation(&self, op: &NewOperation, creator_id: i64) -> Result<Operation>;
    fn get_operation(&self, id: i64) -> Result<Option<Operation>>;
    fn get_operation_by_path(&self, path: &str) -> Result<Option<Operation>>;
    fn list_operations_in_category(&self, category: &str) -> Result<Vec<Operation>>;
    fn update_operation(&self, op: &Operation) -> Result<()>;
    fn touch_operation(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
    /// Removes the operation with its permissions, changes and messages.
    fn delete_operation(&self, id: i64) -> Result<bool>;

    // Permission operations
    fn get_access_level(&self, user_id: i64, op_id: i64) -> Result<Option<AccessLevel>>;
    fn get_creator(&self, op_id: i64) -> Result<Option<User>>;
    fn list_operation_permissions(&self, op_id: i64) -> Result<Vec<Permission>>;
    fn list_user_permissions(&self, user_id: i64) -> Result<Vec<Permission>>;
    fn list_members(&self, op_id: i64) -> Result<Vec<MemberRef>>;
    fn list_non_members(&self, op_id: i64) -> Result<Vec<UserRef>>;
    fn apply_permissions(&self, batch: &PermissionBatch) -> Result<()>;

    // Change operations
    fn create_change(
        &self,
        op_id: i64,
        user_id: i64,
        commit_hash: &str,
        comment: Option<&str>,
    ) -> Result<Change>;
    fn get_change(&self, id: i64) -> Result<Option<Change>>;
    /// Changes of an operation, newest first.
    fn list_changes(&self, op_id: i64, named_only: bool) -> Result<Vec<ChangeSummary>>;
    fn set_version_name(&self, change_id: i64, version_name: Option<&str>) -> Result<bool>;

    // Message operations
    fn create_message(
        &self,
        op_id: i64,
        user_id: i64,
        text: &str,
        message_type: MessageType,
        reply_id: Option<i64>,
    ) -> Result<Message>;
    fn list_messages(&self, op_id: i64) -> Result<Vec<Message>>;
}
