//! SQLite FTS5-based menu search.
//!
//! # Responsibility
//! - Provide keyword search over product names and descriptions.
//! - Return typed hits with stable product IDs.
//!
//! # Invariants
//! - Every whitespace-separated term must match (prefix match, AND-joined).
//! - Result ordering is deterministic by rank, then name.

use crate::db::DbError;
use crate::model::catalog::{CategoryId, ProductId};
use crate::model::Amount;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing, DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid menu search query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { .. } => None,
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Menu search options.
#[derive(Debug, Clone)]
pub struct MenuSearchQuery {
    /// User query text.
    pub text: String,
    pub category_id: Option<CategoryId>,
    /// Hide products that are switched off on the menu.
    pub available_only: bool,
    /// Maximum number of hits to return.
    pub limit: u32,
}

impl MenuSearchQuery {
    /// Storefront query: available products only, 20 hits.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category_id: None,
            available_only: true,
            limit: 20,
        }
    }
}

/// Single hit returned by [`search_menu`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuHit {
    pub product_id: ProductId,
    pub name: String,
    pub price: Amount,
    pub is_available: bool,
    /// Matched fragment with terms wrapped in `[` `]`.
    pub snippet: String,
}

/// Searches the menu via FTS5 and returns ranked results.
///
/// Returns an empty list for blank queries.
pub fn search_menu(conn: &Connection, query: &MenuSearchQuery) -> SearchResult<Vec<MenuHit>> {
    let Some(match_expr) = build_match_expression(&query.text) else {
        return Ok(Vec::new());
    };

    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let mut sql = String::from(
        "SELECT
            products.id AS id,
            products.name AS name,
            products.price AS price,
            products.is_available AS is_available,
            snippet(products_fts, -1, '[', ']', ' ... ', 10) AS snippet
         FROM products_fts
         JOIN products ON products.rowid = products_fts.rowid
         WHERE products_fts MATCH ?",
    );
    let mut bind_values: Vec<Value> = vec![Value::Text(match_expr.clone())];

    if query.available_only {
        sql.push_str(" AND products.is_available = 1");
    }
    if let Some(category_id) = query.category_id {
        sql.push_str(" AND products.category_id = ?");
        bind_values.push(Value::Text(category_id.to_string()));
    }

    sql.push_str(
        " ORDER BY bm25(products_fts), products.name COLLATE NOCASE ASC, products.id ASC LIMIT ?",
    );
    bind_values.push(Value::Integer(i64::from(query.limit)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query(params_from_iter(bind_values))
        .map_err(|err| map_query_error(err, &match_expr))?;
    let mut hits = Vec::new();

    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        hits.push(parse_menu_hit(row)?);
    }

    Ok(hits)
}

fn parse_menu_hit(row: &Row<'_>) -> SearchResult<MenuHit> {
    let id_text: String = row.get("id")?;
    let product_id = Uuid::parse_str(&id_text)
        .map_err(|_| SearchError::InvalidData(format!("invalid uuid `{id_text}`")))?;
    let is_available: i64 = row.get("is_available")?;

    Ok(MenuHit {
        product_id,
        name: row.get("name")?,
        price: row.get("price")?,
        is_available: is_available == 1,
        snippet: row.get("snippet")?,
    })
}

fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"*")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}
