//! Full-text menu search.
//!
//! # Responsibility
//! - Expose query APIs backed by the `products_fts` FTS5 index.
//! - Keep search result shaping inside core.

pub mod fts;
