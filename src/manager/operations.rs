use chrono::{DateTime, Utc};

use super::{FileManager, author_of};
use crate::error::{Error, Result};
use crate::store::path::validate_operation_path;
use crate::types::{
    AccessLevel, AuthorizedUser, CategoryTemplate, MemberRef, NewOperation, Operation,
    OperationDetails, OperationListing, User, UserRef,
};

#[derive(Debug, Clone)]
pub struct NewOperationOptions {
    pub category: String,
    /// Initial document; the configured stub when absent.
    pub content: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Default for NewOperationOptions {
    fn default() -> Self {
        Self {
            category: "default".to_string(),
            content: None,
            last_used: None,
            active: true,
        }
    }
}

impl NewOperationOptions {
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationUpdate {
    Path(String),
    Description(String),
    Category(String),
    Active(bool),
}

fn is_idle(last_used: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold_days: i64) -> bool {
    last_used.is_some_and(|at| (now - at).num_days() > threshold_days)
}

impl FileManager {
    pub fn create_operation(
        &self,
        path: &str,
        description: &str,
        user: &User,
        options: NewOperationOptions,
    ) -> Result<Operation> {
        validate_operation_path(path).inspect_err(|_| {
            tracing::debug!(user_id = user.id, path, "Rejected operation path");
        })?;

        if self.store.get_operation_by_path(path)?.is_some() || self.blobs.exists(path) {
            return Err(Error::conflict(format!("operation already exists: {path}")));
        }

        let op = self.store.create_operation(
            &NewOperation {
                path: path.to_string(),
                description: description.to_string(),
                category: options.category,
                last_used: Some(options.last_used.unwrap_or_else(Utc::now)),
                active: options.active,
            },
            user.id,
        )?;

        let content = options
            .content
            .as_deref()
            .unwrap_or(&self.settings.stub_code);
        if let Err(e) = self.blobs.create(&op.path, content, author_of(user)) {
            tracing::warn!(op_id = op.id, "Storage setup failed, removing operation: {e}");
            if let Err(cleanup) = self.store.delete_operation(op.id) {
                tracing::error!(op_id = op.id, "Failed to remove operation row: {cleanup}");
            }
            return Err(e);
        }

        if !CategoryTemplate::is_template(&op.path, self.permissions.group_postfix()) {
            self.seed_from_template(&op, user)?;
        }

        tracing::info!(op_id = op.id, path = %op.path, user_id = user.id, "Created operation");
        Ok(op)
    }

    fn seed_from_template(&self, op: &Operation, user: &User) -> Result<()> {
        let template_path = CategoryTemplate::path_for(&op.category, self.permissions.group_postfix());
        let Some(template) = self.store.get_operation_by_path(&template_path)? else {
            return Ok(());
        };

        match self
            .permissions
            .import_permissions(template.id, op.id, user.id)
        {
            Ok(outcome) => {
                tracing::debug!(op_id = op.id, template = %template.path, "{}", outcome.message());
            }
            Err(e) => {
                tracing::debug!(op_id = op.id, template = %template.path, "Template not applied: {e}");
            }
        }
        Ok(())
    }

    pub fn get_operation_details(&self, op_id: i64, user: &User) -> Result<OperationDetails> {
        self.permissions.require_member(user.id, op_id)?;
        let op = self.operation(op_id)?;
        Ok(OperationDetails {
            id: op.id,
            path: op.path,
            description: op.description,
            category: op.category,
            active: op.active,
        })
    }

    /// Lists the user's operations, archiving those idle past the threshold.
    pub fn list_operations(&self, user: &User, skip_archived: bool) -> Result<Vec<OperationListing>> {
        let now = Utc::now();
        let mut listings = Vec::new();

        for permission in self.store.list_user_permissions(user.id)? {
            let Some(mut op) = self.store.get_operation(permission.op_id)? else {
                continue;
            };

            if op.active && is_idle(op.last_used, now, self.settings.archive_threshold_days) {
                op.active = false;
                self.store.update_operation(&op)?;
                tracing::info!(op_id = op.id, "Archived idle operation");
            }

            if skip_archived && !op.active {
                continue;
            }

            listings.push(OperationListing {
                op_id: op.id,
                access_level: permission.access_level,
                path: op.path,
                description: op.description,
                category: op.category,
                active: op.active,
            });
        }

        Ok(listings)
    }

    pub fn update_operation(&self, op_id: i64, update: OperationUpdate, user: &User) -> Result<()> {
        self.permissions.require_manager(user.id, op_id)?;
        let mut op = self.operation(op_id)?;

        match update {
            OperationUpdate::Path(new_path) => return self.rename_operation(op, &new_path, user),
            OperationUpdate::Description(description) => op.description = description,
            OperationUpdate::Category(category) => op.category = category,
            OperationUpdate::Active(active) => {
                op.active = active;
                if active {
                    op.last_used = Some(Utc::now());
                }
            }
        }

        self.store.update_operation(&op)
    }

    fn rename_operation(&self, mut op: Operation, new_path: &str, user: &User) -> Result<()> {
        validate_operation_path(new_path).inspect_err(|_| {
            tracing::debug!(user_id = user.id, path = new_path, "Rejected operation path");
        })?;
        if new_path == op.path {
            return Ok(());
        }
        if self.store.get_operation_by_path(new_path)?.is_some() {
            return Err(Error::conflict(format!("operation already exists: {new_path}")));
        }

        let old_path = std::mem::replace(&mut op.path, new_path.to_string());
        self.blobs.rename(&old_path, new_path)?;

        if let Err(e) = self.store.update_operation(&op) {
            tracing::warn!(op_id = op.id, "Rename not recorded, moving directory back: {e}");
            if let Err(undo) = self.blobs.rename(new_path, &old_path) {
                tracing::error!(op_id = op.id, "Failed to move {new_path} back to {old_path}: {undo}");
            }
            return Err(e);
        }

        tracing::info!(op_id = op.id, from = %old_path, to = new_path, "Renamed operation");

        if self.permissions.template_of(&op).is_some() {
            let outcomes = self.permissions.propagate_template(op.id, user.id)?;
            let applied = outcomes.iter().filter(|(_, o)| o.is_applied()).count();
            tracing::info!(op_id = op.id, applied, "Propagated template permissions");
        }
        Ok(())
    }

    /// Removes the operation with all dependent rows and its directory.
    /// Only the creator may do this.
    pub fn delete_operation(&self, op_id: i64, user: &User) -> Result<()> {
        self.permissions
            .require(user.id, op_id, |level| level == AccessLevel::Creator)?;
        let op = self.operation(op_id)?;

        self.store.delete_operation(op.id)?;
        self.blobs.remove(&op.path).inspect_err(|e| {
            tracing::error!(op_id = op.id, path = %op.path, "Operation deleted but directory remains: {e}");
        })?;

        tracing::info!(op_id = op.id, path = %op.path, "Deleted operation");
        Ok(())
    }

    pub fn get_authorized_users(&self, op_id: i64, user: &User) -> Result<Vec<AuthorizedUser>> {
        self.permissions.require_member(user.id, op_id)?;
        Ok(self
            .store
            .list_members(op_id)?
            .into_iter()
            .map(|member| AuthorizedUser {
                username: member.username,
                access_level: member.access_level,
            })
            .collect())
    }

    /// Users that could still be added to the operation.
    pub fn fetch_users_without_permission(&self, op_id: i64, user: &User) -> Result<Vec<UserRef>> {
        self.permissions.require_manager(user.id, op_id)?;
        self.store.list_non_members(op_id)
    }

    /// Members the requester may manage: everyone except themselves and the
    /// creator.
    pub fn fetch_users_with_permission(&self, op_id: i64, user: &User) -> Result<Vec<MemberRef>> {
        self.permissions.require_manager(user.id, op_id)?;
        Ok(self
            .store
            .list_members(op_id)?
            .into_iter()
            .filter(|member| member.id != user.id && member.access_level != AccessLevel::Creator)
            .collect())
    }

    pub fn fetch_operation_creator(&self, op_id: i64, user: &User) -> Result<String> {
        self.permissions.require_manager(user.id, op_id)?;
        self.store
            .get_creator(op_id)?
            .map(|creator| creator.username)
            .ok_or(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_idle() {
        let now = Utc::now();
        assert!(!is_idle(None, now, 30));
        assert!(!is_idle(Some(now - Duration::days(30)), now, 30));
        assert!(is_idle(Some(now - Duration::days(31)), now, 30));
        assert!(is_idle(Some(now - Duration::days(1)), now, 0));
    }

    #[test]
    fn test_options_builder() {
        let options = NewOperationOptions::default().category("tex").content("<x/>");
        assert_eq!(options.category, "tex");
        assert_eq!(options.content.as_deref(), Some("<x/>"));
        assert!(options.active);
    }
}
