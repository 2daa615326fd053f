//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce role checks before any write.
//! - Keep the CLI and future HTTP layers decoupled from storage details.

pub mod analytics_service;
pub mod catalog_service;
pub mod loyalty_service;
pub mod order_service;
pub mod payment_service;
pub mod pos_service;
pub mod review_service;
pub mod settings_service;
pub mod user_service;
