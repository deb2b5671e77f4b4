//! Access control between users and operations.
//!
//! Membership is a single `(user, operation, level)` row. Bulk mutations on a
//! category template fan out to every regular operation of its category.

mod delta;

pub use delta::{ImportOutcome, PermissionDelta, downgrade_creator, plan_import};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{PermissionBatch, Store};
use crate::types::{AccessLevel, CategoryTemplate, Operation, Permission};

#[derive(Clone)]
pub struct PermissionEngine {
    store: Arc<dyn Store>,
    group_postfix: String,
}

impl PermissionEngine {
    pub fn new(store: Arc<dyn Store>, group_postfix: impl Into<String>) -> Self {
        Self {
            store,
            group_postfix: group_postfix.into(),
        }
    }

    pub fn access_level(&self, user_id: i64, op_id: i64) -> Result<Option<AccessLevel>> {
        self.store.get_access_level(user_id, op_id)
    }

    fn has_level(&self, user_id: i64, op_id: i64, level: AccessLevel) -> Result<bool> {
        Ok(self.access_level(user_id, op_id)? == Some(level))
    }

    pub fn is_member(&self, user_id: i64, op_id: i64) -> Result<bool> {
        Ok(self.access_level(user_id, op_id)?.is_some())
    }

    pub fn is_creator(&self, user_id: i64, op_id: i64) -> Result<bool> {
        self.has_level(user_id, op_id, AccessLevel::Creator)
    }

    /// True only for the `admin` level; creators are not admins.
    pub fn is_admin(&self, user_id: i64, op_id: i64) -> Result<bool> {
        self.has_level(user_id, op_id, AccessLevel::Admin)
    }

    pub fn is_collaborator(&self, user_id: i64, op_id: i64) -> Result<bool> {
        self.has_level(user_id, op_id, AccessLevel::Collaborator)
    }

    pub fn is_viewer(&self, user_id: i64, op_id: i64) -> Result<bool> {
        self.has_level(user_id, op_id, AccessLevel::Viewer)
    }

    /// Returns the requester's level if it satisfies `allowed`, otherwise
    /// [`Error::Forbidden`].
    pub fn require(
        &self,
        user_id: i64,
        op_id: i64,
        allowed: impl Fn(AccessLevel) -> bool,
    ) -> Result<AccessLevel> {
        match self.access_level(user_id, op_id)? {
            Some(level) if allowed(level) => Ok(level),
            _ => Err(Error::Forbidden),
        }
    }

    pub fn require_member(&self, user_id: i64, op_id: i64) -> Result<AccessLevel> {
        self.require(user_id, op_id, |_| true)
    }

    pub fn require_manager(&self, user_id: i64, op_id: i64) -> Result<AccessLevel> {
        self.require(user_id, op_id, AccessLevel::can_manage)
    }

    pub fn require_editor(&self, user_id: i64, op_id: i64) -> Result<AccessLevel> {
        self.require(user_id, op_id, AccessLevel::can_edit)
    }

    #[must_use]
    pub fn group_postfix(&self) -> &str {
        &self.group_postfix
    }

    #[must_use]
    pub fn template_of(&self, op: &Operation) -> Option<CategoryTemplate> {
        CategoryTemplate::from_path(&op.path, &self.group_postfix)
    }

    /// Regular (non-template) operations sharing the template's category.
    pub fn category_members(&self, template: &CategoryTemplate) -> Result<Vec<Operation>> {
        let ops = self.store.list_operations_in_category(template.category())?;
        Ok(ops
            .into_iter()
            .filter(|op| !CategoryTemplate::is_template(&op.path, &self.group_postfix))
            .collect())
    }

    fn operation(&self, op_id: i64) -> Result<Operation> {
        self.store.get_operation(op_id)?.ok_or(Error::NotFound)
    }

    /// The operation itself followed by its fan-out targets when it is a
    /// category template.
    fn propagation_targets(&self, op_id: i64) -> Result<Vec<i64>> {
        let op = self.operation(op_id)?;
        let mut targets = vec![op.id];
        if let Some(template) = self.template_of(&op) {
            targets.extend(
                self.category_members(&template)?
                    .into_iter()
                    .map(|member| member.id)
                    .filter(|id| *id != op.id),
            );
        }
        Ok(targets)
    }

    pub fn add_bulk(
        &self,
        op_id: i64,
        requester_id: i64,
        user_ids: &[i64],
        level: AccessLevel,
    ) -> Result<()> {
        self.require_manager(requester_id, op_id)?;
        if level == AccessLevel::Creator {
            return Err(Error::InvalidAccessLevel(
                "creator cannot be granted".to_string(),
            ));
        }

        let users: BTreeSet<i64> = user_ids.iter().copied().collect();
        let mut batch = PermissionBatch::default();
        for target in self.propagation_targets(op_id)? {
            for &user_id in &users {
                if self.store.get_access_level(user_id, target)?.is_none() {
                    batch.insert.push(Permission {
                        user_id,
                        op_id: target,
                        access_level: level,
                    });
                }
            }
        }

        self.store.apply_permissions(&batch)?;
        tracing::info!(
            op_id,
            requester_id,
            added = batch.insert.len(),
            "Granted {level} access"
        );
        Ok(())
    }

    pub fn modify_bulk(
        &self,
        op_id: i64,
        requester_id: i64,
        user_ids: &[i64],
        new_level: AccessLevel,
    ) -> Result<()> {
        self.require_manager(requester_id, op_id)?;
        if new_level == AccessLevel::Creator {
            return Err(Error::InvalidAccessLevel(
                "creator cannot be granted".to_string(),
            ));
        }

        let users: BTreeSet<i64> = user_ids.iter().copied().collect();
        let mut batch = PermissionBatch::default();
        for target in self.propagation_targets(op_id)? {
            batch.update.extend(users.iter().map(|&user_id| Permission {
                user_id,
                op_id: target,
                access_level: new_level,
            }));
        }

        self.store.apply_permissions(&batch)?;
        tracing::info!(op_id, requester_id, "Changed access to {new_level}");
        Ok(())
    }

    /// Removes members. Managers may remove any non-creator member; everyone
    /// else may only remove themselves.
    pub fn delete_bulk(&self, op_id: i64, requester_id: i64, user_ids: &[i64]) -> Result<()> {
        let requester_level = self.require_member(requester_id, op_id)?;
        let users: BTreeSet<i64> = user_ids.iter().copied().collect();

        if requester_level.can_manage() {
            for &user_id in &users {
                match self.store.get_access_level(user_id, op_id)? {
                    None => return Err(Error::NotFound),
                    Some(AccessLevel::Creator) => return Err(Error::Forbidden),
                    Some(_) => {}
                }
            }
        } else if users.len() != 1 || !users.contains(&requester_id) {
            return Err(Error::Forbidden);
        }

        let mut batch = PermissionBatch::default();
        for target in self.propagation_targets(op_id)? {
            batch
                .delete
                .extend(users.iter().map(|&user_id| (user_id, target)));
        }

        self.store.apply_permissions(&batch)?;
        tracing::info!(op_id, requester_id, removed = users.len(), "Removed members");
        Ok(())
    }

    /// Copies the member set of `import_op_id` onto `current_op_id`.
    ///
    /// The requester and the current creator keep their rows; an imported
    /// creator becomes an admin.
    pub fn import_permissions(
        &self,
        import_op_id: i64,
        current_op_id: i64,
        requester_id: i64,
    ) -> Result<ImportOutcome> {
        self.require_manager(requester_id, current_op_id)?;
        self.require_member(requester_id, import_op_id)?;

        let creator = self
            .store
            .get_creator(current_op_id)?
            .ok_or(Error::NotFound)?;

        let existing: BTreeMap<i64, AccessLevel> = self
            .store
            .list_operation_permissions(current_op_id)?
            .into_iter()
            .filter(|p| p.user_id != requester_id && p.access_level != AccessLevel::Creator)
            .map(|p| (p.user_id, p.access_level))
            .collect();

        let imported: BTreeMap<i64, AccessLevel> = self
            .store
            .list_operation_permissions(import_op_id)?
            .into_iter()
            .filter(|p| p.user_id != requester_id && p.user_id != creator.id)
            .map(|p| (p.user_id, downgrade_creator(p.access_level)))
            .collect();

        let Some(delta) = plan_import(&existing, &imported) else {
            return Ok(ImportOutcome::AlreadyApplied);
        };

        let batch = PermissionBatch {
            insert: delta
                .add_users
                .iter()
                .map(|&user_id| Permission {
                    user_id,
                    op_id: current_op_id,
                    access_level: imported[&user_id],
                })
                .collect(),
            update: delta
                .modify_users
                .iter()
                .map(|&user_id| Permission {
                    user_id,
                    op_id: current_op_id,
                    access_level: imported[&user_id],
                })
                .collect(),
            delete: delta
                .delete_users
                .iter()
                .map(|&user_id| (user_id, current_op_id))
                .collect(),
        };

        self.store.apply_permissions(&batch)?;
        tracing::info!(
            import_op_id,
            current_op_id,
            added = delta.add_users.len(),
            modified = delta.modify_users.len(),
            deleted = delta.delete_users.len(),
            "Imported permissions"
        );
        Ok(ImportOutcome::Applied(delta))
    }

    /// Imports the member set of a template into every regular operation of
    /// its category. Operations the requester cannot manage are skipped.
    pub fn propagate_template(
        &self,
        template_op_id: i64,
        requester_id: i64,
    ) -> Result<Vec<(i64, ImportOutcome)>> {
        let op = self.operation(template_op_id)?;
        let Some(template) = self.template_of(&op) else {
            return Ok(Vec::new());
        };

        let mut outcomes = Vec::new();
        for member in self.category_members(&template)? {
            match self.import_permissions(template_op_id, member.id, requester_id) {
                Ok(outcome) => outcomes.push((member.id, outcome)),
                Err(Error::Forbidden) => {
                    tracing::debug!(
                        op_id = member.id,
                        requester_id,
                        "Skipping template propagation: requester cannot manage operation"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::NewOperation;
    use chrono::Utc;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: Arc<SqliteStore>,
        engine: PermissionEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
            store.initialize().unwrap();
            let engine = PermissionEngine::new(store.clone(), "Group");
            Self {
                _temp: temp,
                store,
                engine,
            }
        }

        fn user(&self, name: &str) -> i64 {
            self.store
                .create_user(&format!("{name}@example.com"), name, "h", false)
                .unwrap()
                .id
        }

        fn operation(&self, path: &str, category: &str, creator: i64) -> i64 {
            self.store
                .create_operation(
                    &NewOperation {
                        path: path.to_string(),
                        description: String::new(),
                        category: category.to_string(),
                        last_used: Some(Utc::now()),
                        active: true,
                    },
                    creator,
                )
                .unwrap()
                .id
        }
    }

    #[test]
    fn test_level_checks_without_row_are_false() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let op = fx.operation("alpha", "tex", alice);

        assert!(fx.engine.is_creator(alice, op).unwrap());
        assert!(!fx.engine.is_admin(alice, op).unwrap());
        assert!(!fx.engine.is_member(bob, op).unwrap());
        assert!(!fx.engine.is_viewer(bob, op).unwrap());
        assert!(!fx.engine.is_collaborator(bob, op).unwrap());
        assert_eq!(fx.engine.access_level(bob, op).unwrap(), None);
    }

    #[test]
    fn test_add_bulk_requires_manager() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        let op = fx.operation("alpha", "tex", alice);

        fx.engine
            .add_bulk(op, alice, &[bob], AccessLevel::Collaborator)
            .unwrap();
        assert!(fx.engine.is_collaborator(bob, op).unwrap());

        let result = fx.engine.add_bulk(op, bob, &[carol], AccessLevel::Viewer);
        assert!(matches!(result, Err(Error::Forbidden)));
        assert!(!fx.engine.is_member(carol, op).unwrap());
    }

    #[test]
    fn test_add_bulk_rejects_creator_level() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let op = fx.operation("alpha", "tex", alice);

        let result = fx.engine.add_bulk(op, alice, &[bob], AccessLevel::Creator);
        assert!(matches!(result, Err(Error::InvalidAccessLevel(_))));
    }

    #[test]
    fn test_add_bulk_unknown_user_rolls_back_batch() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let op = fx.operation("alpha", "tex", alice);

        let result = fx.engine.add_bulk(op, alice, &[bob, 9999], AccessLevel::Viewer);
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(!fx.engine.is_member(bob, op).unwrap());
    }

    #[test]
    fn test_modify_bulk_never_changes_creator() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let op = fx.operation("alpha", "tex", alice);
        fx.engine
            .add_bulk(op, alice, &[bob], AccessLevel::Viewer)
            .unwrap();

        fx.engine
            .modify_bulk(op, alice, &[alice, bob], AccessLevel::Admin)
            .unwrap();

        assert!(fx.engine.is_creator(alice, op).unwrap());
        assert!(fx.engine.is_admin(bob, op).unwrap());
    }

    #[test]
    fn test_delete_bulk_self_leave() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        let op = fx.operation("alpha", "tex", alice);
        fx.engine
            .add_bulk(op, alice, &[bob, carol], AccessLevel::Viewer)
            .unwrap();

        let result = fx.engine.delete_bulk(op, bob, &[carol]);
        assert!(matches!(result, Err(Error::Forbidden)));

        fx.engine.delete_bulk(op, bob, &[bob]).unwrap();
        assert!(!fx.engine.is_member(bob, op).unwrap());
        assert!(fx.engine.is_member(carol, op).unwrap());
    }

    #[test]
    fn test_delete_bulk_keeps_creator() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let op = fx.operation("alpha", "tex", alice);
        fx.engine
            .add_bulk(op, alice, &[bob], AccessLevel::Admin)
            .unwrap();

        assert!(matches!(
            fx.engine.delete_bulk(op, alice, &[alice]),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            fx.engine.delete_bulk(op, bob, &[alice]),
            Err(Error::Forbidden)
        ));
        assert!(fx.engine.is_creator(alice, op).unwrap());
    }

    #[test]
    fn test_delete_bulk_non_member_target_fails_whole_batch() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        let op = fx.operation("alpha", "tex", alice);
        fx.engine
            .add_bulk(op, alice, &[bob], AccessLevel::Viewer)
            .unwrap();

        let result = fx.engine.delete_bulk(op, alice, &[bob, carol]);
        assert!(matches!(result, Err(Error::NotFound)));
        assert!(fx.engine.is_member(bob, op).unwrap());
    }

    #[test]
    fn test_template_fans_out_to_category() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let template = fx.operation("texGroup", "tex", alice);
        let first = fx.operation("tex-one", "tex", alice);
        let second = fx.operation("tex-two", "tex", alice);
        let other = fx.operation("other", "default", alice);

        fx.engine
            .add_bulk(template, alice, &[bob], AccessLevel::Collaborator)
            .unwrap();
        for op in [template, first, second] {
            assert!(fx.engine.is_collaborator(bob, op).unwrap());
        }
        assert!(!fx.engine.is_member(bob, other).unwrap());

        fx.engine
            .modify_bulk(template, alice, &[bob], AccessLevel::Viewer)
            .unwrap();
        assert!(fx.engine.is_viewer(bob, second).unwrap());

        fx.engine.delete_bulk(template, alice, &[bob]).unwrap();
        for op in [template, first, second] {
            assert!(!fx.engine.is_member(bob, op).unwrap());
        }
    }

    #[test]
    fn test_template_fan_out_skips_other_templates() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let template = fx.operation("texGroup", "tex", alice);
        let stray = fx.operation("strayGroup", "tex", alice);

        fx.engine
            .add_bulk(template, alice, &[bob], AccessLevel::Viewer)
            .unwrap();
        assert!(!fx.engine.is_member(bob, stray).unwrap());
    }

    #[test]
    fn test_import_permissions() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        let dave = fx.user("dave");
        let source = fx.operation("source", "default", bob);
        let current = fx.operation("current", "default", alice);

        fx.engine
            .add_bulk(source, bob, &[alice], AccessLevel::Admin)
            .unwrap();
        fx.engine
            .add_bulk(source, bob, &[carol], AccessLevel::Collaborator)
            .unwrap();
        fx.engine
            .add_bulk(current, alice, &[dave], AccessLevel::Viewer)
            .unwrap();

        let outcome = fx.engine.import_permissions(source, current, alice).unwrap();
        let ImportOutcome::Applied(delta) = outcome else {
            panic!("expected import to apply");
        };
        let mut added = delta.add_users.clone();
        added.sort_unstable();
        assert_eq!(added, vec![bob, carol]);
        assert_eq!(delta.delete_users, vec![dave]);
        assert!(delta.modify_users.is_empty());

        assert!(fx.engine.is_creator(alice, current).unwrap());
        assert!(fx.engine.is_admin(bob, current).unwrap());
        assert!(fx.engine.is_collaborator(carol, current).unwrap());
        assert!(!fx.engine.is_member(dave, current).unwrap());

        let again = fx.engine.import_permissions(source, current, alice).unwrap();
        assert_eq!(again, ImportOutcome::AlreadyApplied);
        assert_eq!(
            again.into_parts(),
            (false, None, "Permissions are already given")
        );
    }

    #[test]
    fn test_import_reports_modified_users() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let source = fx.operation("source", "default", alice);
        let current = fx.operation("current", "default", alice);
        fx.engine
            .add_bulk(source, alice, &[bob], AccessLevel::Admin)
            .unwrap();
        fx.engine
            .add_bulk(current, alice, &[bob], AccessLevel::Viewer)
            .unwrap();

        let outcome = fx.engine.import_permissions(source, current, alice).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Applied(PermissionDelta {
                add_users: vec![],
                modify_users: vec![bob],
                delete_users: vec![],
            })
        );
        assert!(fx.engine.is_admin(bob, current).unwrap());
    }

    #[test]
    fn test_import_requires_membership_in_source() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let source = fx.operation("source", "default", bob);
        let current = fx.operation("current", "default", alice);

        let result = fx.engine.import_permissions(source, current, alice);
        assert!(matches!(result, Err(Error::Forbidden)));

        let result = fx.engine.import_permissions(current, source, alice);
        assert!(matches!(result, Err(Error::Forbidden)));
    }
}
