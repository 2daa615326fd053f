//! Review repository with SQLite implementation.
//!
//! # Invariants
//! - At most one review per order; a second one is a `RepoError::Conflict`.

use super::common::{
    ensure_connection_ready, map_write_error, parse_uuid, RepoError, RepoResult,
};
use crate::model::catalog::ProductId;
use crate::model::order::OrderId;
use crate::model::review::{Review, ReviewId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const REVIEW_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    order_id,
    rating,
    comment,
    created_at
FROM reviews";

/// Average rating and review count of one product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

/// Repository interface for order reviews.
pub trait ReviewRepository {
    fn create_review(&self, review: &Review) -> RepoResult<ReviewId>;
    fn get_for_order(&self, order_id: OrderId) -> RepoResult<Option<Review>>;
    /// Reviews of orders that contained `product_id`, newest first.
    fn list_for_product(&self, product_id: ProductId) -> RepoResult<Vec<Review>>;
    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Review>>;
    fn rating_summary(&self, product_id: ProductId) -> RepoResult<RatingSummary>;
}

/// SQLite-backed review repository.
pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["reviews", "order_items"])?;
        Ok(Self { conn })
    }
}

impl ReviewRepository for SqliteReviewRepository<'_> {
    fn create_review(&self, review: &Review) -> RepoResult<ReviewId> {
        review.validate()?;
        self.conn
            .execute(
                "INSERT INTO reviews (id, user_id, order_id, rating, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    review.id.to_string(),
                    review.user_id.to_string(),
                    review.order_id.to_string(),
                    i64::from(review.rating),
                    review.comment.as_deref(),
                    review.created_at,
                ],
            )
            .map_err(|err| map_write_error(err, "order has already been reviewed"))?;
        Ok(review.id)
    }

    fn get_for_order(&self, order_id: OrderId) -> RepoResult<Option<Review>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REVIEW_SELECT_SQL} WHERE order_id = ?1;"))?;
        let row = stmt
            .query_row([order_id.to_string()], |row| Ok(read_review_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_for_product(&self, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL}
             WHERE order_id IN (
                SELECT order_id FROM order_items WHERE product_id = ?1
             )
             ORDER BY created_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([product_id.to_string()])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(read_review_row(row)?);
        }
        Ok(reviews)
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL} ORDER BY created_at DESC, id ASC LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(read_review_row(row)?);
        }
        Ok(reviews)
    }

    fn rating_summary(&self, product_id: ProductId) -> RepoResult<RatingSummary> {
        let (average, count): (Option<f64>, i64) = self.conn.query_row(
            "SELECT AVG(rating), COUNT(*)
             FROM reviews
             WHERE order_id IN (
                SELECT order_id FROM order_items WHERE product_id = ?1
             );",
            [product_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(RatingSummary {
            average: average.unwrap_or(0.0),
            count: u32::try_from(count)
                .map_err(|_| RepoError::InvalidData(format!("review count {count} out of range")))?,
        })
    }
}

fn read_review_row(row: &Row<'_>) -> RepoResult<Review> {
    let id_text: String = row.get("id")?;
    let user_id_text: String = row.get("user_id")?;
    let order_id_text: String = row.get("order_id")?;
    let rating: i64 = row.get("rating")?;

    let review = Review {
        id: parse_uuid(&id_text, "reviews.id")?,
        user_id: parse_uuid(&user_id_text, "reviews.user_id")?,
        order_id: parse_uuid(&order_id_text, "reviews.order_id")?,
        rating: u8::try_from(rating)
            .map_err(|_| RepoError::InvalidData(format!("invalid rating `{rating}`")))?,
        comment: row.get("comment")?,
        created_at: row.get("created_at")?,
    };
    review.validate()?;
    Ok(review)
}
