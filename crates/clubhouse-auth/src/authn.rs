use std::sync::Arc;

use clubhouse_db::Database;
use clubhouse_db::models::{NewUser, ProfileUpdate};
use clubhouse_types::models::Principal;
use tracing::info;
use uuid::Uuid;

use crate::{AccountError, AuthError, PasswordHasher};

/// Registration input. Fields are assumed already validated.
pub struct NewAccount<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// Profile edit input. `password: None` keeps the current hash.
pub struct ProfileChanges<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password: Option<&'a str>,
    pub avatar_ref: Option<&'a str>,
}

/// Verifies credentials and owns every write to a user's credentials
/// or profile.
pub struct AuthenticationService {
    db: Arc<Database>,
    hasher: PasswordHasher,
    default_avatar: String,
}

impl AuthenticationService {
    pub fn new(db: Arc<Database>, hasher: PasswordHasher, default_avatar: impl Into<String>) -> Self {
        Self {
            db,
            hasher,
            default_avatar: default_avatar.into(),
        }
    }

    /// Exact, case-sensitive username match followed by a hash check.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or(AuthError::UnknownUser)?;

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(AuthError::BadPassword);
        }

        Ok(user.to_principal()?)
    }

    /// Create a `basic` user with the default avatar. Does not log in.
    pub fn register(&self, account: &NewAccount<'_>) -> Result<Uuid, AccountError> {
        // Cheap early exit before paying for a hash; the insert re-checks
        // inside its transaction.
        if self.db.get_user_by_email(account.email)?.is_some() {
            return Err(AccountError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash(account.password)?;

        let id = self.db.create_user(&NewUser {
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            username: account.username,
            password_hash: &password_hash,
            avatar_ref: &self.default_avatar,
        })?;

        info!("Registered user {} ({})", account.username, id);
        Ok(id)
    }

    /// Overwrite the password of the user registered under `email`.
    pub fn recover_password(&self, email: &str, new_password: &str) -> Result<(), AccountError> {
        if self.db.get_user_by_email(email)?.is_none() {
            return Err(AccountError::UnknownEmail);
        }

        let password_hash = self.hasher.hash(new_password)?;

        self.db
            .update_password_by_email(email, &password_hash)
            .map_err(|e| match AccountError::from(e) {
                AccountError::NotFound => AccountError::UnknownEmail,
                other => other,
            })?;

        info!("Password reset through recovery");
        Ok(())
    }

    pub fn update_profile(&self, user_id: Uuid, changes: &ProfileChanges<'_>) -> Result<(), AccountError> {
        let password_hash = match changes.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(self.hasher.hash(password)?),
            None => None,
        };

        self.db.update_profile(
            user_id,
            &ProfileUpdate {
                first_name: changes.first_name,
                last_name: changes.last_name,
                email: changes.email,
                username: changes.username,
                password_hash: password_hash.as_deref(),
                avatar_ref: changes.avatar_ref,
            },
        )?;

        info!("Profile updated for user {}", user_id);
        Ok(())
    }
}
