//! Order repository with SQLite implementation.
//!
//! # Invariants
//! - An order and its items are written in one transaction.
//! - Items keep their insertion position.
//! - Order codes are unique; collisions surface as `RepoError::Conflict`.
//! - Lifecycle writes only apply while the stored status still matches the
//!   status the caller read, and carry the loyalty credit in the same
//!   transaction.

use super::common::{
    ensure_connection_ready, from_json, map_write_error, parse_enum, parse_optional_uuid,
    parse_uuid, to_json, to_u32, RepoError, RepoResult,
};
use super::loyalty_repo::upsert_account;
use crate::model::cart::LineItem;
use crate::model::catalog::ProductOption;
use crate::model::loyalty::LoyaltyAccount;
use crate::model::order::{Order, OrderId, OrderStatus, Payment, PaymentMethod, PaymentStatus};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ORDER_SELECT_SQL: &str = "SELECT
    id,
    code,
    user_id,
    subtotal,
    discount,
    total,
    payment_method,
    payment_status,
    status,
    note,
    points_awarded,
    created_at,
    updated_at,
    completed_at
FROM orders";

/// Query options for order lists.
///
/// `created_from` is inclusive and `created_to` exclusive, both epoch ms.
#[derive(Debug, Clone, Default)]
pub struct OrderListQuery {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub created_from: Option<i64>,
    pub created_to: Option<i64>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for customer orders.
pub trait OrderRepository {
    fn create_order(&self, order: &Order) -> RepoResult<OrderId>;
    fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>>;
    fn find_by_code(&self, code: &str) -> RepoResult<Option<Order>>;
    fn list_orders(&self, query: &OrderListQuery) -> RepoResult<Vec<Order>>;
    /// Persists status, payment, completion and awarded points of `order`
    /// if its stored status is still `expected`, together with `credited`.
    ///
    /// A status that moved on in the meantime yields `RepoError::Conflict`
    /// and writes nothing.
    fn save_lifecycle(
        &self,
        order: &Order,
        expected: OrderStatus,
        credited: Option<&LoyaltyAccount>,
    ) -> RepoResult<()>;
}

/// SQLite-backed order repository.
pub struct SqliteOrderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrderRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["orders", "order_items", "loyalty"])?;
        Ok(Self { conn })
    }
}

impl OrderRepository for SqliteOrderRepository<'_> {
    fn create_order(&self, order: &Order) -> RepoResult<OrderId> {
        order.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO orders (
                id,
                code,
                user_id,
                subtotal,
                discount,
                total,
                payment_method,
                payment_status,
                status,
                note,
                points_awarded,
                created_at,
                updated_at,
                completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                order.id.to_string(),
                order.code.as_str(),
                order.user_id.map(|id| id.to_string()),
                order.subtotal,
                order.discount,
                order.total,
                order.payment.method.as_str(),
                order.payment.status.as_str(),
                order.status.as_str(),
                order.note.as_deref(),
                order.points_awarded,
                order.created_at,
                order.updated_at,
                order.completed_at,
            ],
        )
        .map_err(|err| map_write_error(err, format!("order code `{}` already used", order.code)))?;

        for (position, item) in order.items.iter().enumerate() {
            let variant_json = item
                .variant
                .as_ref()
                .map(|variant| to_json(variant, "order_items.variant_json"))
                .transpose()?;
            tx.execute(
                "INSERT INTO order_items (
                    order_id,
                    position,
                    product_id,
                    product_name,
                    unit_price,
                    variant_json,
                    toppings_json,
                    quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    order.id.to_string(),
                    position as i64,
                    item.product_id.to_string(),
                    item.product_name.as_str(),
                    item.unit_price,
                    variant_json,
                    to_json(&item.toppings, "order_items.toppings_json")?,
                    i64::from(item.quantity),
                ],
            )?;
        }

        tx.commit()?;
        Ok(order.id)
    }

    fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        self.get_one("id", id.to_string())
    }

    fn find_by_code(&self, code: &str) -> RepoResult<Option<Order>> {
        self.get_one("code", code.trim().to_ascii_uppercase())
    }

    fn list_orders(&self, query: &OrderListQuery) -> RepoResult<Vec<Order>> {
        let mut sql = format!("{ORDER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(user_id) = query.user_id {
            sql.push_str(" AND user_id = ?");
            bind_values.push(Value::Text(user_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from) = query.created_from {
            sql.push_str(" AND created_at >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(to) = query.created_to {
            sql.push_str(" AND created_at < ?");
            bind_values.push(Value::Integer(to));
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
        let mut orders = Vec::new();
        while let Some(row) = rows.next()? {
            let mut order = read_order_row(row)?;
            order.items = load_items(self.conn, &order.id.to_string())?;
            orders.push(order);
        }
        Ok(orders)
    }

    fn save_lifecycle(
        &self,
        order: &Order,
        expected: OrderStatus,
        credited: Option<&LoyaltyAccount>,
    ) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE orders
             SET
                status = ?1,
                payment_status = ?2,
                points_awarded = ?3,
                updated_at = ?4,
                completed_at = ?5
             WHERE id = ?6 AND status = ?7;",
            params![
                order.status.as_str(),
                order.payment.status.as_str(),
                order.points_awarded,
                order.updated_at,
                order.completed_at,
                order.id.to_string(),
                expected.as_str(),
            ],
        )?;
        if changed == 0 {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM orders WHERE id = ?1;",
                    [order.id.to_string()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Err(RepoError::not_found("order", order.id));
            }
            return Err(RepoError::Conflict(format!(
                "order `{}` is no longer `{}`",
                order.code,
                expected.as_str()
            )));
        }
        if let Some(account) = credited {
            upsert_account(&tx, account)?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl SqliteOrderRepository<'_> {
    fn get_one(&self, column: &'static str, value: String) -> RepoResult<Option<Order>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORDER_SELECT_SQL} WHERE {column} = ?1;"))?;
        let row = stmt
            .query_row([value], |row| Ok(read_order_row(row)))
            .optional()?;
        match row.transpose()? {
            Some(mut order) => {
                order.items = load_items(self.conn, &order.id.to_string())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }
}

fn read_order_row(row: &Row<'_>) -> RepoResult<Order> {
    let id_text: String = row.get("id")?;
    let method_text: String = row.get("payment_method")?;
    let payment_status_text: String = row.get("payment_status")?;
    let status_text: String = row.get("status")?;

    Ok(Order {
        id: parse_uuid(&id_text, "orders.id")?,
        code: row.get("code")?,
        user_id: parse_optional_uuid(row.get("user_id")?, "orders.user_id")?,
        items: Vec::new(),
        subtotal: row.get("subtotal")?,
        discount: row.get("discount")?,
        total: row.get("total")?,
        payment: Payment {
            method: parse_enum(&method_text, "orders.payment_method", PaymentMethod::parse)?,
            status: parse_enum(
                &payment_status_text,
                "orders.payment_status",
                PaymentStatus::parse,
            )?,
        },
        status: parse_enum(&status_text, "orders.status", OrderStatus::parse)?,
        note: row.get("note")?,
        points_awarded: row.get("points_awarded")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    })
}

fn load_items(conn: &Connection, order_id: &str) -> RepoResult<Vec<LineItem>> {
    let mut stmt = conn.prepare(
        "SELECT
            product_id,
            product_name,
            unit_price,
            variant_json,
            toppings_json,
            quantity
         FROM order_items
         WHERE order_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([order_id])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let product_id_text: String = row.get("product_id")?;
        let variant_json: Option<String> = row.get("variant_json")?;
        let toppings_json: String = row.get("toppings_json")?;
        items.push(LineItem {
            product_id: parse_uuid(&product_id_text, "order_items.product_id")?,
            product_name: row.get("product_name")?,
            unit_price: row.get("unit_price")?,
            variant: variant_json
                .map(|raw| from_json::<ProductOption>(&raw, "order_items.variant_json"))
                .transpose()?,
            toppings: from_json(&toppings_json, "order_items.toppings_json")?,
            quantity: to_u32(row.get("quantity")?, "order_items.quantity")?,
        });
    }
    Ok(items)
}
