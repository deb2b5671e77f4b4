use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::AccessLevel;

/// Users affected by a permission import, for notifying connected clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionDelta {
    pub add_users: Vec<i64>,
    pub modify_users: Vec<i64>,
    pub delete_users: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Applied(PermissionDelta),
    AlreadyApplied,
}

impl ImportOutcome {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            ImportOutcome::Applied(_) => "success",
            ImportOutcome::AlreadyApplied => "Permissions are already given",
        }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, ImportOutcome::Applied(_))
    }

    /// Flattens the outcome into `(applied, delta, message)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, Option<PermissionDelta>, &'static str) {
        let message = self.message();
        match self {
            ImportOutcome::Applied(delta) => (true, Some(delta), message),
            ImportOutcome::AlreadyApplied => (false, None, message),
        }
    }
}

/// Three-way comparison of the member levels an operation has against the
/// levels it should end up with. Returns `None` when both sides agree.
#[must_use]
pub fn plan_import(
    existing: &BTreeMap<i64, AccessLevel>,
    imported: &BTreeMap<i64, AccessLevel>,
) -> Option<PermissionDelta> {
    if existing == imported {
        return None;
    }

    let delete_users = existing
        .keys()
        .filter(|user| !imported.contains_key(*user))
        .copied()
        .collect();
    let add_users = imported
        .keys()
        .filter(|user| !existing.contains_key(*user))
        .copied()
        .collect();
    let modify_users = imported
        .iter()
        .filter(|&(user, level)| existing.get(user).is_some_and(|current| current != level))
        .map(|(user, _)| *user)
        .collect();

    Some(PermissionDelta {
        add_users,
        modify_users,
        delete_users,
    })
}

/// Imported `creator` rows become `admin`: an operation keeps its own creator.
#[must_use]
pub fn downgrade_creator(level: AccessLevel) -> AccessLevel {
    match level {
        AccessLevel::Creator => AccessLevel::Admin,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(entries: &[(i64, AccessLevel)]) -> BTreeMap<i64, AccessLevel> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_equal_sets_need_nothing() {
        let set = levels(&[(2, AccessLevel::Admin), (3, AccessLevel::Viewer)]);
        assert_eq!(plan_import(&set, &set.clone()), None);
    }

    #[test]
    fn test_three_way_delta() {
        let existing = levels(&[
            (2, AccessLevel::Viewer),
            (3, AccessLevel::Collaborator),
            (4, AccessLevel::Admin),
        ]);
        let imported = levels(&[
            (3, AccessLevel::Collaborator),
            (4, AccessLevel::Viewer),
            (5, AccessLevel::Admin),
        ]);

        let delta = plan_import(&existing, &imported).unwrap();
        assert_eq!(delta.delete_users, vec![2]);
        assert_eq!(delta.add_users, vec![5]);
        assert_eq!(delta.modify_users, vec![4]);
    }

    #[test]
    fn test_empty_import_removes_everyone() {
        let existing = levels(&[(2, AccessLevel::Viewer)]);
        let delta = plan_import(&existing, &BTreeMap::new()).unwrap();
        assert_eq!(delta.delete_users, vec![2]);
        assert!(delta.add_users.is_empty());
    }

    #[test]
    fn test_outcome_parts() {
        let (applied, delta, message) = ImportOutcome::AlreadyApplied.into_parts();
        assert!(!applied);
        assert!(delta.is_none());
        assert_eq!(message, "Permissions are already given");

        let (applied, delta, message) =
            ImportOutcome::Applied(PermissionDelta::default()).into_parts();
        assert!(applied);
        assert!(delta.is_some());
        assert_eq!(message, "success");
    }

    #[test]
    fn test_downgrade_creator() {
        assert_eq!(downgrade_creator(AccessLevel::Creator), AccessLevel::Admin);
        assert_eq!(downgrade_creator(AccessLevel::Viewer), AccessLevel::Viewer);
    }
}
