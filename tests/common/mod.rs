#![allow(dead_code)]

use mscolab::FileManager;
use mscolab::config::Settings;
use mscolab::manager::NewOperationOptions;
use mscolab::types::{Operation, User};
use tempfile::TempDir;

pub struct TestEnv {
    pub manager: FileManager,
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    pub fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let mut settings = Settings::with_data_dir(dir.path());
        configure(&mut settings);
        let manager = FileManager::open(settings).expect("failed to open manager");
        Self { manager, dir }
    }

    pub fn user(&self, name: &str) -> User {
        self.manager
            .create_user(&format!("{name}@example.com"), name, "password")
            .expect("failed to create user")
    }

    pub fn operation(&self, path: &str, category: &str, owner: &User) -> Operation {
        self.manager
            .create_operation(
                path,
                "test operation",
                owner,
                NewOperationOptions::default().category(category),
            )
            .expect("failed to create operation")
    }
}
