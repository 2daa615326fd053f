//! Favorite products per customer.

use super::common::{ensure_connection_ready, map_write_error, parse_uuid, RepoResult};
use crate::model::catalog::ProductId;
use crate::model::now_ms;
use crate::model::review::Favorite;
use crate::model::user::UserId;
use rusqlite::{params, Connection};

/// Repository interface for favorites.
pub trait FavoriteRepository {
    /// Adds a favorite; returns `false` when it already existed.
    fn add_favorite(&self, user_id: UserId, product_id: ProductId) -> RepoResult<bool>;
    /// Removes a favorite; returns `false` when none existed.
    fn remove_favorite(&self, user_id: UserId, product_id: ProductId) -> RepoResult<bool>;
    fn is_favorite(&self, user_id: UserId, product_id: ProductId) -> RepoResult<bool>;
    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Favorite>>;
}

/// SQLite-backed favorite repository.
pub struct SqliteFavoriteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFavoriteRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["favorites"])?;
        Ok(Self { conn })
    }
}

impl FavoriteRepository for SqliteFavoriteRepository<'_> {
    fn add_favorite(&self, user_id: UserId, product_id: ProductId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO favorites (user_id, product_id, created_at)
                 VALUES (?1, ?2, ?3);",
                params![user_id.to_string(), product_id.to_string(), now_ms()],
            )
            .map_err(|err| map_write_error(err, "unknown user or product"))?;
        Ok(changed > 0)
    }

    fn remove_favorite(&self, user_id: UserId, product_id: ProductId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND product_id = ?2;",
            params![user_id.to_string(), product_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn is_favorite(&self, user_id: UserId, product_id: ProductId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM favorites WHERE user_id = ?1 AND product_id = ?2
            );",
            params![user_id.to_string(), product_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Favorite>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, product_id, created_at
             FROM favorites
             WHERE user_id = ?1
             ORDER BY created_at DESC, product_id ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut favorites = Vec::new();
        while let Some(row) = rows.next()? {
            let user_id_text: String = row.get("user_id")?;
            let product_id_text: String = row.get("product_id")?;
            favorites.push(Favorite {
                user_id: parse_uuid(&user_id_text, "favorites.user_id")?,
                product_id: parse_uuid(&product_id_text, "favorites.product_id")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(favorites)
    }
}
