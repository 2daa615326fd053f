//! Role-based permission gates for back-office and POS operations.
//!
//! # Invariants
//! - Customers hold only storefront permissions.
//! - Admins hold every permission.
//! - Permission string ids are lowercase and stable.

use crate::model::user::{User, UserId, UserRole};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Operation class guarded by role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    PlaceOrder,
    ManageOrders,
    ManageCatalog,
    ManageUsers,
    ViewAnalytics,
    ManageSettings,
    OperatePos,
}

pub const PERMISSION_PLACE_ORDER: &str = "place_order";
pub const PERMISSION_MANAGE_ORDERS: &str = "manage_orders";
pub const PERMISSION_MANAGE_CATALOG: &str = "manage_catalog";
pub const PERMISSION_MANAGE_USERS: &str = "manage_users";
pub const PERMISSION_VIEW_ANALYTICS: &str = "view_analytics";
pub const PERMISSION_MANAGE_SETTINGS: &str = "manage_settings";
pub const PERMISSION_OPERATE_POS: &str = "operate_pos";

const CUSTOMER_PERMISSIONS: &[Permission] = &[Permission::PlaceOrder];

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlaceOrder => PERMISSION_PLACE_ORDER,
            Self::ManageOrders => PERMISSION_MANAGE_ORDERS,
            Self::ManageCatalog => PERMISSION_MANAGE_CATALOG,
            Self::ManageUsers => PERMISSION_MANAGE_USERS,
            Self::ViewAnalytics => PERMISSION_VIEW_ANALYTICS,
            Self::ManageSettings => PERMISSION_MANAGE_SETTINGS,
            Self::OperatePos => PERMISSION_OPERATE_POS,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            PERMISSION_PLACE_ORDER => Some(Self::PlaceOrder),
            PERMISSION_MANAGE_ORDERS => Some(Self::ManageOrders),
            PERMISSION_MANAGE_CATALOG => Some(Self::ManageCatalog),
            PERMISSION_MANAGE_USERS => Some(Self::ManageUsers),
            PERMISSION_VIEW_ANALYTICS => Some(Self::ViewAnalytics),
            PERMISSION_MANAGE_SETTINGS => Some(Self::ManageSettings),
            PERMISSION_OPERATE_POS => Some(Self::OperatePos),
            _ => None,
        }
    }
}

/// Whether `role` is granted `permission`.
pub fn role_allows(role: UserRole, permission: Permission) -> bool {
    match role {
        UserRole::Admin => true,
        UserRole::Customer => CUSTOMER_PERMISSIONS.contains(&permission),
    }
}

/// Authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Maintenance identity used by operator tooling.
    pub fn system() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn allows(&self, permission: Permission) -> bool {
        role_allows(self.role, permission)
    }

    pub fn ensure(&self, permission: Permission) -> Result<(), AccessError> {
        if self.allows(permission) {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                role: self.role,
                permission,
            })
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    Forbidden {
        role: UserRole,
        permission: Permission,
    },
    /// Caller does not own the record it tried to touch.
    NotOwner,
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden { role, permission } => write!(
                f,
                "role `{}` is not allowed to `{}`",
                role.as_str(),
                permission.as_str()
            ),
            Self::NotOwner => write!(f, "record belongs to another user"),
        }
    }
}

impl Error for AccessError {}
