//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Phone numbers are unique; duplicates surface as `RepoError::Conflict`.
//! - Archived users are hidden from lists unless explicitly requested.

use super::common::{
    bool_to_int, ensure_connection_ready, map_write_error, parse_bool, parse_enum, parse_uuid,
    RepoError, RepoResult,
};
use crate::model::now_ms;
use crate::model::user::{User, UserId, UserRole, UserStatus};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    phone,
    password_hash,
    role,
    status,
    is_archived,
    created_at,
    updated_at
FROM users";

/// Query options for back-office user lists.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub include_archived: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_phone(&self, phone: &str) -> RepoResult<Option<User>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>>;
    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;

        self.conn
            .execute(
                "INSERT INTO users (
                    id,
                    name,
                    phone,
                    password_hash,
                    role,
                    status,
                    is_archived,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    user.id.to_string(),
                    user.name.as_str(),
                    user.phone.as_str(),
                    user.password_hash.as_str(),
                    user.role.as_str(),
                    user.status.as_str(),
                    bool_to_int(user.is_archived),
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(|err| map_write_error(err, "phone number is already registered"))?;

        Ok(user.id)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET
                    name = ?1,
                    phone = ?2,
                    role = ?3,
                    status = ?4,
                    is_archived = ?5,
                    updated_at = ?6
                 WHERE id = ?7;",
                params![
                    user.name.as_str(),
                    user.phone.as_str(),
                    user.role.as_str(),
                    user.status.as_str(),
                    bool_to_int(user.is_archived),
                    now_ms(),
                    user.id.to_string(),
                ],
            )
            .map_err(|err| map_write_error(err, "phone number is already registered"))?;

        if changed == 0 {
            return Err(RepoError::not_found("user", user.id));
        }
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_user_row(row)))
            .optional()?;
        row.transpose()
    }

    fn find_by_phone(&self, phone: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE phone = ?1;"))?;
        let row = stmt
            .query_row([phone], |row| Ok(read_user_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_archived {
            sql.push_str(" AND is_archived = 0");
        }
        if let Some(role) = query.role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(read_user_row(row)?);
        }
        Ok(users)
    }

    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET password_hash = ?1, updated_at = ?2
             WHERE id = ?3;",
            params![password_hash, now_ms(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }
}

fn read_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let status_text: String = row.get("status")?;

    let user = User {
        id: parse_uuid(&id_text, "users.id")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        password_hash: row.get("password_hash")?,
        role: parse_enum(&role_text, "users.role", UserRole::parse)?,
        status: parse_enum(&status_text, "users.status", UserStatus::parse)?,
        is_archived: parse_bool(row.get("is_archived")?, "users.is_archived")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    user.validate()?;
    Ok(user)
}
