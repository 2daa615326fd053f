//! User account model.
//!
//! # Invariants
//! - `phone` is stored in normalized local form (`0` + 9..=10 digits).
//! - `password_hash` is a PHC string; plaintext never reaches this type.
//! - Archived users stay in storage so historical orders keep their owner.

use super::{now_ms, require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

static PHONE_SEPARATORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-\.\(\)]+").expect("valid phone separator regex"));
static LOCAL_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0\d{9,10}$").expect("valid local phone regex"));

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Self::Customer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Account status managed from the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Blocked,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// Canonical user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Creates an active, non-archived user with a generated id.
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        password_hash: impl Into<String>,
        role: UserRole,
    ) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            password_hash: password_hash.into(),
            role,
            status: UserStatus::Active,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account may sign in and place orders.
    pub fn can_sign_in(&self) -> bool {
        self.status == UserStatus::Active && !self.is_archived
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("password_hash", &self.password_hash)?;
        if !LOCAL_PHONE_RE.is_match(&self.phone) {
            return Err(ValidationError::InvalidPhone(self.phone.clone()));
        }
        Ok(())
    }
}

/// Normalizes user-entered phone numbers to local form.
///
/// Separators are stripped and the `+84` / `84` country prefix is rewritten
/// to a leading `0`.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let compact = PHONE_SEPARATORS_RE.replace_all(raw.trim(), "");
    let local = if let Some(rest) = compact.strip_prefix("+84") {
        format!("0{rest}")
    } else if compact.starts_with("84") && compact.len() >= 11 {
        format!("0{}", &compact[2..])
    } else {
        compact.into_owned()
    };

    if LOCAL_PHONE_RE.is_match(&local) {
        Ok(local)
    } else {
        Err(ValidationError::InvalidPhone(raw.trim().to_string()))
    }
}
