mod commands;
mod operation;
mod permission;
mod user;

pub use commands::{OpCommands, PermCommands, UserCommands};
pub use operation::run_op;
pub use permission::run_perm;
pub use user::run_user;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Settings;
use crate::manager::FileManager;
use crate::types::User;

/// Resolves settings from an optional config file, with `--data-dir`
/// taking precedence over the file.
pub fn load_settings(
    data_dir: Option<PathBuf>,
    config: Option<&Path>,
) -> anyhow::Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(data_dir) = data_dir {
        settings.data_dir = data_dir;
    }
    Ok(settings)
}

/// Opens an initialized data directory.
pub fn open_manager(settings: Settings) -> anyhow::Result<FileManager> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'mscolab init' first.",
            db_path.display()
        );
    }
    FileManager::open(settings).map_err(Into::into)
}

/// Shared state for commands that act on behalf of a user.
pub struct Context {
    pub manager: FileManager,
    pub json: bool,
    acting_as: Option<String>,
}

impl Context {
    pub fn new(manager: FileManager, json: bool, acting_as: Option<String>) -> Self {
        Self {
            manager,
            json,
            acting_as,
        }
    }

    /// The user named by `--as`.
    pub fn acting_user(&self) -> anyhow::Result<User> {
        let Some(email) = self.acting_as.as_deref() else {
            anyhow::bail!("--as <EMAIL> is required for this command");
        };
        self.user_by_email(email)
    }

    pub fn user_by_email(&self, email: &str) -> anyhow::Result<User> {
        self.manager
            .store()
            .get_user_by_email(email)?
            .ok_or_else(|| anyhow::anyhow!("User not found: {email}"))
    }

    pub fn user_ids(&self, emails: &[String]) -> anyhow::Result<Vec<i64>> {
        emails
            .iter()
            .map(|email| self.user_by_email(email).map(|user| user.id))
            .collect()
    }

    /// Prints `value` as pretty JSON when `--json` was given, otherwise
    /// runs `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

pub fn confirm_action(message: &str, yes: bool, non_interactive: bool) -> anyhow::Result<bool> {
    if yes {
        Ok(true)
    } else if non_interactive {
        anyhow::bail!("--yes is required for destructive operations in non-interactive mode");
    } else {
        Ok(inquire::Confirm::new(message)
            .with_default(false)
            .prompt()?)
    }
}
