//! Loyalty ledger persistence.

use super::common::{ensure_connection_ready, parse_enum, parse_uuid, RepoResult};
use crate::model::loyalty::{LoyaltyAccount, Tier};
use crate::model::user::UserId;
use rusqlite::{params, Connection, OptionalExtension, Row};

const LOYALTY_SELECT_SQL: &str = "SELECT
    user_id,
    points,
    tier,
    total_spent,
    order_count,
    updated_at
FROM loyalty";

/// Repository interface for loyalty accounts.
pub trait LoyaltyRepository {
    fn get_account(&self, user_id: UserId) -> RepoResult<Option<LoyaltyAccount>>;
    /// Inserts or replaces the account row of `account.user_id`.
    fn save_account(&self, account: &LoyaltyAccount) -> RepoResult<()>;
    /// Accounts ordered by points, highest first.
    fn list_accounts(&self, limit: Option<u32>) -> RepoResult<Vec<LoyaltyAccount>>;
}

/// SQLite-backed loyalty repository.
pub struct SqliteLoyaltyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLoyaltyRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["loyalty"])?;
        Ok(Self { conn })
    }
}

impl LoyaltyRepository for SqliteLoyaltyRepository<'_> {
    fn get_account(&self, user_id: UserId) -> RepoResult<Option<LoyaltyAccount>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LOYALTY_SELECT_SQL} WHERE user_id = ?1;"))?;
        let row = stmt
            .query_row([user_id.to_string()], |row| Ok(read_account_row(row)))
            .optional()?;
        row.transpose()
    }

    fn save_account(&self, account: &LoyaltyAccount) -> RepoResult<()> {
        upsert_account(self.conn, account)
    }

    fn list_accounts(&self, limit: Option<u32>) -> RepoResult<Vec<LoyaltyAccount>> {
        let sql = format!("{LOYALTY_SELECT_SQL} ORDER BY points DESC, user_id ASC LIMIT ?1;");
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([limit])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(read_account_row(row)?);
        }
        Ok(accounts)
    }
}

/// Upsert shared with order completion, which writes the account inside the
/// order's transaction.
pub(crate) fn upsert_account(conn: &Connection, account: &LoyaltyAccount) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO loyalty (user_id, points, tier, total_spent, order_count, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
            points = excluded.points,
            tier = excluded.tier,
            total_spent = excluded.total_spent,
            order_count = excluded.order_count,
            updated_at = excluded.updated_at;",
        params![
            account.user_id.to_string(),
            account.points,
            account.tier.as_str(),
            account.total_spent,
            account.order_count,
            account.updated_at,
        ],
    )?;
    Ok(())
}

fn read_account_row(row: &Row<'_>) -> RepoResult<LoyaltyAccount> {
    let user_id_text: String = row.get("user_id")?;
    let tier_text: String = row.get("tier")?;
    Ok(LoyaltyAccount {
        user_id: parse_uuid(&user_id_text, "loyalty.user_id")?,
        points: row.get("points")?,
        tier: parse_enum(&tier_text, "loyalty.tier", Tier::parse)?,
        total_spent: row.get("total_spent")?,
        order_count: row.get("order_count")?,
        updated_at: row.get("updated_at")?,
    })
}
