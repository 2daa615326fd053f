//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access traits per aggregate.
//! - Keep SQL and JSON column encoding out of the service layer.
//!
//! # Invariants
//! - Write paths validate domain records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories only accept connections migrated to the latest schema.

pub mod catalog_repo;
pub mod common;
pub mod favorite_repo;
pub mod loyalty_repo;
pub mod order_repo;
pub mod pos_repo;
pub mod review_repo;
pub mod settings_repo;
pub mod user_repo;
