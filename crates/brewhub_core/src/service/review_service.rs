//! Reviews of completed orders and customer favorites.
//!
//! # Invariants
//! - Only the owner of a completed order may review it, once.
//! - Favorites reference existing products; listing skips deleted ones.

use crate::access::{AccessError, Actor};
use crate::model::catalog::{Product, ProductId};
use crate::model::order::{OrderId, OrderStatus};
use crate::model::review::Review;
use crate::model::ValidationError;
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::common::RepoError;
use crate::repo::favorite_repo::FavoriteRepository;
use crate::repo::order_repo::OrderRepository;
use crate::repo::review_repo::{RatingSummary, ReviewRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ReviewServiceError {
    Validation(ValidationError),
    Access(AccessError),
    OrderNotFound(OrderId),
    ProductNotFound(ProductId),
    /// Reviews are accepted for completed orders only.
    OrderNotCompleted(OrderStatus),
    AlreadyReviewed(OrderId),
    Repo(RepoError),
}

impl Display for ReviewServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::OrderNotFound(id) => write!(f, "order not found: {id}"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::OrderNotCompleted(status) => {
                write!(f, "order is `{}`, only completed orders can be reviewed", status.as_str())
            }
            Self::AlreadyReviewed(id) => write!(f, "order {id} has already been reviewed"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReviewServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReviewServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ReviewServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessError> for ReviewServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

/// Product page view: reviews plus aggregate rating.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductReviews {
    pub summary: RatingSummary,
    pub reviews: Vec<Review>,
}

pub struct ReviewService<R: ReviewRepository, O: OrderRepository> {
    reviews: R,
    orders: O,
}

impl<R: ReviewRepository, O: OrderRepository> ReviewService<R, O> {
    pub fn new(reviews: R, orders: O) -> Self {
        Self { reviews, orders }
    }

    pub fn submit_review(
        &self,
        actor: &Actor,
        order_id: OrderId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Review, ReviewServiceError> {
        let order = self
            .orders
            .get_order(order_id)?
            .ok_or(ReviewServiceError::OrderNotFound(order_id))?;
        if order.user_id != Some(actor.user_id) {
            return Err(AccessError::NotOwner.into());
        }
        if order.status != OrderStatus::Completed {
            return Err(ReviewServiceError::OrderNotCompleted(order.status));
        }

        let review = Review::new(actor.user_id, order_id, rating, comment);
        review.validate()?;
        match self.reviews.create_review(&review) {
            Ok(_) => {}
            Err(RepoError::Conflict(_)) => {
                return Err(ReviewServiceError::AlreadyReviewed(order_id))
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            "event=review_submit module=review status=ok order_id={} rating={}",
            order_id, review.rating
        );
        Ok(review)
    }

    pub fn review_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Review>, ReviewServiceError> {
        Ok(self.reviews.get_for_order(order_id)?)
    }

    pub fn product_reviews(
        &self,
        product_id: ProductId,
    ) -> Result<ProductReviews, ReviewServiceError> {
        Ok(ProductReviews {
            summary: self.reviews.rating_summary(product_id)?,
            reviews: self.reviews.list_for_product(product_id)?,
        })
    }

    pub fn recent_reviews(&self, limit: u32) -> Result<Vec<Review>, ReviewServiceError> {
        Ok(self.reviews.list_recent(limit)?)
    }
}

pub struct FavoriteService<F: FavoriteRepository, C: CatalogRepository> {
    favorites: F,
    catalog: C,
}

impl<F: FavoriteRepository, C: CatalogRepository> FavoriteService<F, C> {
    pub fn new(favorites: F, catalog: C) -> Self {
        Self { favorites, catalog }
    }

    /// Flips the favorite flag and returns the new state.
    pub fn toggle_favorite(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> Result<bool, ReviewServiceError> {
        if self.catalog.get_product(product_id)?.is_none() {
            return Err(ReviewServiceError::ProductNotFound(product_id));
        }
        let now_favorite = if self.favorites.is_favorite(actor.user_id, product_id)? {
            self.favorites.remove_favorite(actor.user_id, product_id)?;
            false
        } else {
            self.favorites.add_favorite(actor.user_id, product_id)?;
            true
        };
        info!(
            "event=favorite_toggle module=review status=ok product_id={product_id} favorite={now_favorite}"
        );
        Ok(now_favorite)
    }

    pub fn is_favorite(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> Result<bool, ReviewServiceError> {
        Ok(self.favorites.is_favorite(actor.user_id, product_id)?)
    }

    /// Favorite products of `actor`, most recently added first.
    pub fn list_favorites(&self, actor: &Actor) -> Result<Vec<Product>, ReviewServiceError> {
        let mut products = Vec::new();
        for favorite in self.favorites.list_for_user(actor.user_id)? {
            if let Some(product) = self.catalog.get_product(favorite.product_id)? {
                products.push(product);
            }
        }
        Ok(products)
    }
}
