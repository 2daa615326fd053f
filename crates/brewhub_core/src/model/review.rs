//! Reviews and favorites.

use super::catalog::ProductId;
use super::order::OrderId;
use super::user::UserId;
use super::{now_ms, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ReviewId = Uuid;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Customer feedback for one completed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Review {
    pub fn new(user_id: UserId, order_id: OrderId, rating: u8, comment: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            order_id,
            rating,
            comment: comment
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            created_at: now_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(ValidationError::InvalidRating(self.rating));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: i64,
}
