//! Orchestrates operations across the metadata store and the blob store.
//!
//! Every call takes the acting user and checks their access level before
//! touching either store. Content and metadata are kept in step by running
//! the blob step and the row step in order and undoing the earlier step when
//! the later one fails.

mod changes;
mod operations;
mod users;

pub use operations::{NewOperationOptions, OperationUpdate};
pub use users::UserUpdate;

use std::fs;
use std::sync::Arc;

use crate::auth::PasswordHasher;
use crate::blob::{Author, BlobStore};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::permission::{ImportOutcome, PermissionEngine};
use crate::store::{SqliteStore, Store};
use crate::types::{AccessLevel, Operation, User};

pub struct FileManager {
    store: Arc<dyn Store>,
    blobs: BlobStore,
    permissions: PermissionEngine,
    hasher: PasswordHasher,
    settings: Settings,
}

impl FileManager {
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
        let blobs = BlobStore::new(settings.data_dir.clone());
        let permissions = PermissionEngine::new(store.clone(), settings.group_postfix.clone());
        Self {
            store,
            blobs,
            permissions,
            hasher: PasswordHasher::new(),
            settings,
        }
    }

    /// Opens (and initializes if needed) the SQLite database inside the
    /// configured data directory.
    pub fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        fs::create_dir_all(&settings.data_dir)?;
        let store = SqliteStore::new(settings.db_path())?;
        store.initialize()?;
        Ok(Self::new(Arc::new(store), settings))
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    #[must_use]
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    #[must_use]
    pub fn permissions(&self) -> &PermissionEngine {
        &self.permissions
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn operation(&self, op_id: i64) -> Result<Operation> {
        self.store.get_operation(op_id)?.ok_or(Error::NotFound)
    }

    pub fn add_bulk_permission(
        &self,
        op_id: i64,
        user: &User,
        user_ids: &[i64],
        level: AccessLevel,
    ) -> Result<()> {
        self.permissions.add_bulk(op_id, user.id, user_ids, level)
    }

    pub fn modify_bulk_permission(
        &self,
        op_id: i64,
        user: &User,
        user_ids: &[i64],
        level: AccessLevel,
    ) -> Result<()> {
        self.permissions.modify_bulk(op_id, user.id, user_ids, level)
    }

    pub fn delete_bulk_permission(&self, op_id: i64, user: &User, user_ids: &[i64]) -> Result<()> {
        self.permissions.delete_bulk(op_id, user.id, user_ids)
    }

    pub fn import_permissions(
        &self,
        import_op_id: i64,
        current_op_id: i64,
        user: &User,
    ) -> Result<ImportOutcome> {
        self.permissions
            .import_permissions(import_op_id, current_op_id, user.id)
    }
}

fn author_of(user: &User) -> Author<'_> {
    Author::new(&user.username, &user.email)
}
