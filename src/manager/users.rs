use super::FileManager;
use crate::error::{Error, Result};
use crate::types::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserUpdate {
    Email(String),
    Username(String),
    Password(String),
}

fn validate_account(email: &str, username: &str) -> Result<()> {
    if !email.contains('@') || email.trim() != email {
        return Err(Error::InvalidInput(format!("invalid email address: {email}")));
    }
    if username.trim().is_empty() {
        return Err(Error::InvalidInput("username cannot be empty".to_string()));
    }
    Ok(())
}

impl FileManager {
    /// Registers an account. Email addresses are unique.
    pub fn create_user(&self, email: &str, username: &str, password: &str) -> Result<User> {
        validate_account(email, username)?;
        let hash = self.hasher.hash(password)?;
        let user = self.store.create_user(email, username, &hash, false)?;
        tracing::info!(user_id = user.id, "Created user");
        Ok(user)
    }

    /// Registers an account authenticated by an external identity provider.
    /// It has no usable password.
    pub fn create_idp_user(&self, email: &str, username: &str) -> Result<User> {
        validate_account(email, username)?;
        let user = self.store.create_user(email, username, "", true)?;
        tracing::info!(user_id = user.id, "Created identity provider user");
        Ok(user)
    }

    /// Returns the account if `password` matches; [`Error::Forbidden`]
    /// otherwise.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .get_user_by_email(email)?
            .ok_or(Error::Forbidden)?;
        if !self.verify_password(&user, password)? {
            return Err(Error::Forbidden);
        }
        Ok(user)
    }

    /// Checks a password against the account's stored hash. Accounts
    /// managed by an identity provider never match.
    pub fn verify_password(&self, user: &User, password: &str) -> Result<bool> {
        if user.authorized_by_idp {
            return Ok(false);
        }
        self.hasher.verify(password, &user.password_hash)
    }

    pub fn get_user(&self, user_id: i64) -> Result<User> {
        self.store.get_user(user_id)?.ok_or(Error::NotFound)
    }

    pub fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<User> {
        let mut user = self.get_user(user_id)?;
        match update {
            UserUpdate::Email(email) => {
                validate_account(&email, &user.username)?;
                let taken = self.store.get_user_by_email(&email)?;
                if taken.is_some_and(|other| other.id != user.id) {
                    return Err(Error::conflict("email already registered"));
                }
                user.email = email;
            }
            UserUpdate::Username(username) => {
                validate_account(&user.email, &username)?;
                user.username = username;
            }
            UserUpdate::Password(password) => {
                user.password_hash = self.hasher.hash(&password)?;
            }
        }
        self.store.update_user(&user)?;
        Ok(user)
    }

    /// Deletes the account along with its memberships and messages.
    /// Creators and users with recorded changes cannot be deleted.
    pub fn delete_user(&self, user_id: i64) -> Result<()> {
        if !self.store.delete_user(user_id)? {
            return Err(Error::NotFound);
        }
        tracing::info!(user_id, "Deleted user");
        Ok(())
    }
}
