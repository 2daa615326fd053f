//! User accounts, sign-in and back-office user management.
//!
//! # Responsibility
//! - Register customers and create admins with hashed passwords.
//! - Verify credentials and gate blocked/archived accounts.
//! - Let admins reset passwords, block and archive accounts.
//!
//! # Invariants
//! - Plaintext passwords never leave this module; only PHC hashes are stored.
//! - Phone numbers are normalized before any lookup or write.
//! - Log events carry ids only, never phones or passwords.

use crate::access::{AccessError, Actor, Permission};
use crate::model::user::{normalize_phone, User, UserId, UserRole, UserStatus};
use crate::model::ValidationError;
use crate::repo::common::RepoError;
use crate::repo::user_repo::{UserListQuery, UserRepository};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_USER_LIST_LIMIT: u32 = 50;
const MAX_USER_LIST_LIMIT: u32 = 200;

#[derive(Debug)]
pub enum UserServiceError {
    Validation(ValidationError),
    Access(AccessError),
    /// Phone/password pair does not match an account.
    InvalidCredentials,
    /// Account is blocked or archived.
    AccountDisabled(UserId),
    UserNotFound(String),
    /// Phone number already belongs to another account.
    PhoneTaken,
    PasswordHash,
    Repo(RepoError),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::InvalidCredentials => write!(f, "invalid phone number or password"),
            Self::AccountDisabled(id) => write!(f, "account {id} is disabled"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::PhoneTaken => write!(f, "phone number is already registered"),
            Self::PasswordHash => write!(f, "failed to hash password"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::UserNotFound(id),
            RepoError::Conflict(_) => Self::PhoneTaken,
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for UserServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessError> for UserServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

/// User service facade over a user repository.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Self-service storefront registration.
    pub fn register_customer(
        &self,
        name: &str,
        phone: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        self.create_account(name, phone, password, UserRole::Customer)
    }

    /// Creates a back-office account. Requires `manage_users`.
    pub fn create_admin(
        &self,
        actor: &Actor,
        name: &str,
        phone: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        actor.ensure(Permission::ManageUsers)?;
        self.create_account(name, phone, password, UserRole::Admin)
    }

    /// Verifies credentials and returns the signed-in user.
    pub fn sign_in(&self, phone: &str, password: &str) -> Result<User, UserServiceError> {
        let phone = normalize_phone(phone).map_err(|_| UserServiceError::InvalidCredentials)?;
        let Some(user) = self.repo.find_by_phone(&phone)? else {
            warn!("event=user_sign_in module=user status=error error_code=unknown_account");
            return Err(UserServiceError::InvalidCredentials);
        };

        if verify_password(password, &user.password_hash).is_err() {
            warn!(
                "event=user_sign_in module=user status=error user_id={} error_code=bad_password",
                user.id
            );
            return Err(UserServiceError::InvalidCredentials);
        }
        if !user.can_sign_in() {
            warn!(
                "event=user_sign_in module=user status=error user_id={} error_code=disabled",
                user.id
            );
            return Err(UserServiceError::AccountDisabled(user.id));
        }

        info!(
            "event=user_sign_in module=user status=ok user_id={} role={}",
            user.id,
            user.role.as_str()
        );
        Ok(user)
    }

    /// Replaces the caller's password after checking the current one.
    pub fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self.require_user(user_id)?;
        verify_password(current_password, &user.password_hash)
            .map_err(|_| UserServiceError::InvalidCredentials)?;
        check_password_policy(new_password)?;

        self.repo
            .set_password_hash(user.id, &hash_password(new_password)?)?;
        info!("event=user_password_change module=user status=ok user_id={}", user.id);
        Ok(())
    }

    /// Admin-initiated reset for the account owning `phone`.
    pub fn reset_password(
        &self,
        actor: &Actor,
        phone: &str,
        new_password: &str,
    ) -> Result<User, UserServiceError> {
        actor.ensure(Permission::ManageUsers)?;
        let phone = normalize_phone(phone)?;
        check_password_policy(new_password)?;

        let user = self
            .repo
            .find_by_phone(&phone)?
            .ok_or_else(|| UserServiceError::UserNotFound(phone.clone()))?;
        self.repo
            .set_password_hash(user.id, &hash_password(new_password)?)?;
        info!(
            "event=user_password_reset module=user status=ok user_id={} actor_id={}",
            user.id, actor.user_id
        );
        self.require_user(user.id)
    }

    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>, UserServiceError> {
        Ok(self.repo.get_user(user_id)?)
    }

    /// Back-office listing with clamped page size.
    pub fn list_users(
        &self,
        actor: &Actor,
        query: &UserListQuery,
    ) -> Result<Vec<User>, UserServiceError> {
        actor.ensure(Permission::ManageUsers)?;
        let mut query = query.clone();
        query.limit = Some(
            query
                .limit
                .unwrap_or(DEFAULT_USER_LIST_LIMIT)
                .clamp(1, MAX_USER_LIST_LIMIT),
        );
        Ok(self.repo.list_users(&query)?)
    }

    /// Blocks or unblocks an account.
    pub fn set_user_status(
        &self,
        actor: &Actor,
        user_id: UserId,
        status: UserStatus,
    ) -> Result<User, UserServiceError> {
        actor.ensure(Permission::ManageUsers)?;
        let mut user = self.require_user(user_id)?;
        user.status = status;
        self.repo.update_user(&user)?;
        info!(
            "event=user_status_change module=user status=ok user_id={} user_status={} actor_id={}",
            user.id,
            status.as_str(),
            actor.user_id
        );
        self.require_user(user_id)
    }

    /// Archives or restores an account.
    pub fn set_archived(
        &self,
        actor: &Actor,
        user_id: UserId,
        is_archived: bool,
    ) -> Result<User, UserServiceError> {
        actor.ensure(Permission::ManageUsers)?;
        let mut user = self.require_user(user_id)?;
        user.is_archived = is_archived;
        self.repo.update_user(&user)?;
        info!(
            "event=user_archive module=user status=ok user_id={} archived={} actor_id={}",
            user.id, is_archived, actor.user_id
        );
        self.require_user(user_id)
    }

    fn create_account(
        &self,
        name: &str,
        phone: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, UserServiceError> {
        let phone = normalize_phone(phone)?;
        check_password_policy(password)?;

        let user = User::new(name.trim(), phone, hash_password(password)?, role);
        user.validate()?;
        if let Err(err) = self.repo.create_user(&user) {
            warn!(
                "event=user_register module=user status=error role={} error={}",
                role.as_str(),
                err
            );
            return Err(err.into());
        }

        info!(
            "event=user_register module=user status=ok user_id={} role={}",
            user.id,
            role.as_str()
        );
        self.require_user(user.id)
    }

    fn require_user(&self, user_id: UserId) -> Result<User, UserServiceError> {
        self.repo
            .get_user(user_id)?
            .ok_or_else(|| UserServiceError::UserNotFound(user_id.to_string()))
    }
}

fn check_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::WeakPassword {
            min_len: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| UserServiceError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), UserServiceError> {
    let parsed = PasswordHash::new(hash).map_err(|_| UserServiceError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| UserServiceError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::{check_password_policy, hash_password, verify_password};

    #[test]
    fn password_policy_counts_characters() {
        assert!(check_password_policy("12345").is_err());
        assert!(check_password_policy("123456").is_ok());
        assert!(check_password_policy("mật khẩu").is_ok());
    }

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("espresso").unwrap();
        let second = hash_password("espresso").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2"));
        assert!(verify_password("espresso", &first).is_ok());
        assert!(verify_password("latte", &first).is_err());
    }
}
