//! Core domain logic for the BrewHub coffee shop.
//! This crate is the single source of truth for storefront, back-office and
//! POS business invariants.

pub mod access;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use access::{AccessError, Actor, Permission};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LogConfig, LoggingError,
};
pub use model::cart::{Cart, LineItem, LineKey};
pub use model::catalog::{Category, CategoryId, Product, ProductId, ProductOption};
pub use model::loyalty::{LoyaltyAccount, Tier};
pub use model::order::{Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus};
pub use model::user::{User, UserId, UserRole, UserStatus};
pub use model::{Amount, ValidationError};
pub use repo::common::{RepoError, RepoResult};
pub use search::fts::{search_menu, MenuHit, MenuSearchQuery, SearchError, SearchResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
