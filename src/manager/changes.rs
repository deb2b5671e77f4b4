use chrono::Utc;
use git2::Oid;

use super::{FileManager, author_of};
use crate::blob::unified_diff;
use crate::error::{Error, Result};
use crate::types::{Change, ChangeSummary, Operation, User};

const SAVE_MESSAGE: &str = "committing changes";

impl FileManager {
    /// Saves new document content as a revision.
    ///
    /// Returns `Ok(false)` without touching history when the content equals
    /// the current document line by line.
    pub fn save_file(
        &self,
        op_id: i64,
        content: &str,
        user: &User,
        comment: Option<&str>,
    ) -> Result<bool> {
        self.permissions.require_member(user.id, op_id)?;
        let op = self.operation(op_id)?;

        let current = self.blobs.read(&op.path)?;
        if unified_diff(&current, content)?.is_empty() {
            tracing::debug!(op_id, user_id = user.id, "Save skipped, content unchanged");
            return Ok(false);
        }

        let previous_head = self.blobs.head(&op.path)?;
        let oid = self
            .blobs
            .commit(&op.path, content, SAVE_MESSAGE, author_of(user))?;
        let change = self.record_change(&op, user, oid, previous_head, comment)?;

        tracing::info!(op_id, user_id = user.id, change_id = change.id, commit = %oid, "Saved operation");
        Ok(true)
    }

    /// Inserts the change row for a fresh commit; the commit is rolled back
    /// when the row cannot be written.
    fn record_change(
        &self,
        op: &Operation,
        user: &User,
        oid: Oid,
        previous_head: Oid,
        comment: Option<&str>,
    ) -> Result<Change> {
        let change = match self
            .store
            .create_change(op.id, user.id, &oid.to_string(), comment)
        {
            Ok(change) => change,
            Err(e) => {
                tracing::warn!(op_id = op.id, "Change not recorded, resetting to {previous_head}: {e}");
                if let Err(reset) = self.blobs.reset_to(&op.path, previous_head) {
                    tracing::error!(op_id = op.id, "Failed to reset {}: {reset}", op.path);
                }
                return Err(e);
            }
        };

        if let Err(e) = self.store.touch_operation(op.id, Utc::now()) {
            tracing::warn!(op_id = op.id, change_id = change.id, "Failed to update last use: {e}");
        }
        Ok(change)
    }

    pub fn get_file(&self, op_id: i64, user: &User) -> Result<String> {
        self.permissions.require_member(user.id, op_id)?;
        let op = self.operation(op_id)?;
        self.blobs.read(&op.path)
    }

    /// Change history, newest first; `named_only` keeps labelled versions.
    pub fn get_all_changes(
        &self,
        op_id: i64,
        user: &User,
        named_only: bool,
    ) -> Result<Vec<ChangeSummary>> {
        self.permissions.require_member(user.id, op_id)?;
        self.store.list_changes(op_id, named_only)
    }

    fn change(&self, change_id: i64) -> Result<Change> {
        self.store.get_change(change_id)?.ok_or(Error::NotFound)
    }

    /// Document content as it was recorded by the change.
    pub fn get_change_content(&self, change_id: i64, user: &User) -> Result<String> {
        let change = self.change(change_id)?;
        self.permissions.require_member(user.id, change.op_id)?;
        let op = self.operation(change.op_id)?;
        self.blobs.read_at(&op.path, &change.commit_hash)
    }

    /// Unified diff the change introduced relative to the revision before it.
    pub fn get_change_diff(&self, change_id: i64, user: &User) -> Result<String> {
        let change = self.change(change_id)?;
        self.permissions.require_member(user.id, change.op_id)?;
        let op = self.operation(change.op_id)?;
        self.blobs.diff_of(&op.path, &change.commit_hash)
    }

    /// Labels a change; `None` or a blank name clears the label.
    pub fn set_version_name(
        &self,
        change_id: i64,
        op_id: i64,
        user: &User,
        version_name: Option<&str>,
    ) -> Result<()> {
        self.permissions.require_editor(user.id, op_id)?;
        let change = self.change(change_id)?;
        if change.op_id != op_id {
            return Err(Error::NotFound);
        }

        let version_name = version_name.map(str::trim).filter(|name| !name.is_empty());
        self.store.set_version_name(change.id, version_name)?;
        tracing::debug!(op_id, change_id, ?version_name, "Updated version name");
        Ok(())
    }

    /// Restores the document recorded by `change_id` as a new revision and
    /// records who restored it. Earlier history is kept.
    pub fn undo_changes(&self, change_id: i64, user: &User) -> Result<Change> {
        let target = self.change(change_id)?;
        self.permissions.require_editor(user.id, target.op_id)?;
        let op = self.operation(target.op_id)?;

        let restored = self
            .blobs
            .read_at(&op.path, &target.commit_hash)
            .and_then(|content| {
                let previous_head = self.blobs.head(&op.path)?;
                let message = format!("checkout to {}", target.commit_hash);
                let oid = self
                    .blobs
                    .commit(&op.path, &content, &message, author_of(user))?;
                Ok((oid, previous_head))
            });

        let (oid, previous_head) = restored.inspect_err(|e| {
            tracing::debug!(op_id = op.id, change_id, "Undo failed: {e}");
        })?;

        let change = self.record_change(&op, user, oid, previous_head, None)?;
        tracing::info!(op_id = op.id, change_id, restored_by = user.id, "Restored change");
        Ok(change)
    }
}
