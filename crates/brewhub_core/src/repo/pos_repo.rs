//! Point-of-sale persistence: tables, open tabs and invoices.
//!
//! # Invariants
//! - A table has at most one open tab (partial unique index).
//! - Settling a tab writes the invoice, closes the tab and frees the table
//!   in one transaction.

use super::common::{
    ensure_connection_ready, from_json, map_write_error, parse_enum, parse_optional_uuid,
    parse_uuid, to_json, to_u32, RepoError, RepoResult,
};
use crate::model::now_ms;
use crate::model::order::PaymentMethod;
use crate::model::pos::{
    DiningTable, Invoice, InvoiceId, PosOrder, PosOrderId, PosOrderStatus, PrintStatus, TableId,
    TableStatus,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const TABLE_SELECT_SQL: &str = "SELECT id, name, capacity, status, created_at FROM pos_tables";

const POS_ORDER_SELECT_SQL: &str = "SELECT
    id,
    table_id,
    staff_id,
    items_json,
    status,
    note,
    created_at,
    updated_at
FROM pos_orders";

const INVOICE_SELECT_SQL: &str = "SELECT
    id,
    code,
    pos_order_id,
    table_id,
    subtotal,
    discount,
    total,
    payment_method,
    print_status,
    print_count,
    created_at,
    printed_at
FROM invoices";

/// Repository interface for POS records.
pub trait PosRepository {
    fn create_table(&self, table: &DiningTable) -> RepoResult<TableId>;
    fn get_table(&self, id: TableId) -> RepoResult<Option<DiningTable>>;
    fn list_tables(&self) -> RepoResult<Vec<DiningTable>>;
    fn delete_table(&self, id: TableId) -> RepoResult<()>;

    /// Inserts a new tab and marks its table occupied.
    fn create_pos_order(&self, order: &PosOrder) -> RepoResult<PosOrderId>;
    fn get_pos_order(&self, id: PosOrderId) -> RepoResult<Option<PosOrder>>;
    fn find_open_for_table(&self, table_id: TableId) -> RepoResult<Option<PosOrder>>;
    fn list_open_orders(&self) -> RepoResult<Vec<PosOrder>>;
    /// Persists items, note and status. Closing a tab frees its table.
    fn save_pos_order(&self, order: &PosOrder) -> RepoResult<()>;

    /// Writes `invoice` and closes its tab atomically.
    fn settle(&self, invoice: &Invoice) -> RepoResult<InvoiceId>;
    fn get_invoice(&self, id: InvoiceId) -> RepoResult<Option<Invoice>>;
    /// Invoices created within `[from_ms, to_ms)`, oldest first.
    fn list_invoices(&self, from_ms: i64, to_ms: i64) -> RepoResult<Vec<Invoice>>;
    fn count_invoices_between(&self, from_ms: i64, to_ms: i64) -> RepoResult<u32>;
    fn mark_printed(&self, id: InvoiceId) -> RepoResult<Invoice>;
}

/// SQLite-backed POS repository.
pub struct SqlitePosRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePosRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["pos_tables", "pos_orders", "invoices"])?;
        Ok(Self { conn })
    }
}

impl PosRepository for SqlitePosRepository<'_> {
    fn create_table(&self, table: &DiningTable) -> RepoResult<TableId> {
        table.validate()?;
        self.conn
            .execute(
                "INSERT INTO pos_tables (id, name, capacity, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    table.id.to_string(),
                    table.name.as_str(),
                    i64::from(table.capacity),
                    table.status.as_str(),
                    table.created_at,
                ],
            )
            .map_err(|err| map_write_error(err, format!("table `{}` already exists", table.name)))?;
        Ok(table.id)
    }

    fn get_table(&self, id: TableId) -> RepoResult<Option<DiningTable>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TABLE_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_table_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_tables(&self) -> RepoResult<Vec<DiningTable>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TABLE_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut tables = Vec::new();
        while let Some(row) = rows.next()? {
            tables.push(read_table_row(row)?);
        }
        Ok(tables)
    }

    fn delete_table(&self, id: TableId) -> RepoResult<()> {
        if self.find_open_for_table(id)?.is_some() {
            return Err(RepoError::Conflict("table has an open tab".to_string()));
        }
        let changed = self
            .conn
            .execute("DELETE FROM pos_tables WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("table", id));
        }
        Ok(())
    }

    fn create_pos_order(&self, order: &PosOrder) -> RepoResult<PosOrderId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO pos_orders (
                id,
                table_id,
                staff_id,
                items_json,
                status,
                note,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                order.id.to_string(),
                order.table_id.map(|id| id.to_string()),
                order.staff_id.map(|id| id.to_string()),
                to_json(&order.items, "pos_orders.items_json")?,
                order.status.as_str(),
                order.note.as_deref(),
                order.created_at,
                order.updated_at,
            ],
        )
        .map_err(|err| map_write_error(err, "table already has an open tab"))?;

        if let Some(table_id) = order.table_id {
            let changed = tx.execute(
                "UPDATE pos_tables SET status = ?1 WHERE id = ?2;",
                params![TableStatus::Occupied.as_str(), table_id.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::not_found("table", table_id));
            }
        }

        tx.commit()?;
        Ok(order.id)
    }

    fn get_pos_order(&self, id: PosOrderId) -> RepoResult<Option<PosOrder>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POS_ORDER_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_pos_order_row(row)))
            .optional()?;
        row.transpose()
    }

    fn find_open_for_table(&self, table_id: TableId) -> RepoResult<Option<PosOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POS_ORDER_SELECT_SQL} WHERE table_id = ?1 AND status = 'open';"
        ))?;
        let row = stmt
            .query_row([table_id.to_string()], |row| Ok(read_pos_order_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_open_orders(&self) -> RepoResult<Vec<PosOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POS_ORDER_SELECT_SQL} WHERE status = 'open' ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next()? {
            orders.push(read_pos_order_row(row)?);
        }
        Ok(orders)
    }

    fn save_pos_order(&self, order: &PosOrder) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE pos_orders
             SET items_json = ?1, status = ?2, note = ?3, updated_at = ?4
             WHERE id = ?5;",
            params![
                to_json(&order.items, "pos_orders.items_json")?,
                order.status.as_str(),
                order.note.as_deref(),
                order.updated_at,
                order.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("pos order", order.id));
        }
        if let (false, Some(table_id)) = (order.is_open(), order.table_id) {
            tx.execute(
                "UPDATE pos_tables SET status = ?1 WHERE id = ?2;",
                params![TableStatus::Available.as_str(), table_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn settle(&self, invoice: &Invoice) -> RepoResult<InvoiceId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO invoices (
                id,
                code,
                pos_order_id,
                table_id,
                subtotal,
                discount,
                total,
                payment_method,
                print_status,
                print_count,
                created_at,
                printed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                invoice.id.to_string(),
                invoice.code.as_str(),
                invoice.pos_order_id.to_string(),
                invoice.table_id.map(|id| id.to_string()),
                invoice.subtotal,
                invoice.discount,
                invoice.total,
                invoice.payment_method.as_str(),
                invoice.print_status.as_str(),
                i64::from(invoice.print_count),
                invoice.created_at,
                invoice.printed_at,
            ],
        )
        .map_err(|err| {
            map_write_error(err, format!("invoice `{}` conflicts with an existing one", invoice.code))
        })?;

        let changed = tx.execute(
            "UPDATE pos_orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'open';",
            params![
                PosOrderStatus::Invoiced.as_str(),
                now_ms(),
                invoice.pos_order_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::Conflict("pos order is not open".to_string()));
        }

        if let Some(table_id) = invoice.table_id {
            tx.execute(
                "UPDATE pos_tables SET status = ?1 WHERE id = ?2;",
                params![TableStatus::Available.as_str(), table_id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(invoice.id)
    }

    fn get_invoice(&self, id: InvoiceId) -> RepoResult<Option<Invoice>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVOICE_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_invoice_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_invoices(&self, from_ms: i64, to_ms: i64) -> RepoResult<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INVOICE_SELECT_SQL}
             WHERE created_at >= ?1 AND created_at < ?2
             ORDER BY created_at ASC, code ASC;"
        ))?;
        let mut rows = stmt.query([from_ms, to_ms])?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            invoices.push(read_invoice_row(row)?);
        }
        Ok(invoices)
    }

    fn count_invoices_between(&self, from_ms: i64, to_ms: i64) -> RepoResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM invoices WHERE created_at >= ?1 AND created_at < ?2;",
            [from_ms, to_ms],
            |row| row.get(0),
        )?;
        to_u32(count, "invoices.count")
    }

    fn mark_printed(&self, id: InvoiceId) -> RepoResult<Invoice> {
        let changed = self.conn.execute(
            "UPDATE invoices
             SET print_status = ?1, print_count = print_count + 1, printed_at = ?2
             WHERE id = ?3;",
            params![PrintStatus::Printed.as_str(), now_ms(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("invoice", id));
        }
        self.get_invoice(id)?
            .ok_or_else(|| RepoError::not_found("invoice", id))
    }
}

fn read_table_row(row: &Row<'_>) -> RepoResult<DiningTable> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    Ok(DiningTable {
        id: parse_uuid(&id_text, "pos_tables.id")?,
        name: row.get("name")?,
        capacity: to_u32(row.get("capacity")?, "pos_tables.capacity")?,
        status: parse_enum(&status_text, "pos_tables.status", TableStatus::parse)?,
        created_at: row.get("created_at")?,
    })
}

fn read_pos_order_row(row: &Row<'_>) -> RepoResult<PosOrder> {
    let id_text: String = row.get("id")?;
    let items_json: String = row.get("items_json")?;
    let status_text: String = row.get("status")?;
    Ok(PosOrder {
        id: parse_uuid(&id_text, "pos_orders.id")?,
        table_id: parse_optional_uuid(row.get("table_id")?, "pos_orders.table_id")?,
        staff_id: parse_optional_uuid(row.get("staff_id")?, "pos_orders.staff_id")?,
        items: from_json(&items_json, "pos_orders.items_json")?,
        status: parse_enum(&status_text, "pos_orders.status", PosOrderStatus::parse)?,
        note: row.get("note")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn read_invoice_row(row: &Row<'_>) -> RepoResult<Invoice> {
    let id_text: String = row.get("id")?;
    let order_id_text: String = row.get("pos_order_id")?;
    let method_text: String = row.get("payment_method")?;
    let print_text: String = row.get("print_status")?;
    Ok(Invoice {
        id: parse_uuid(&id_text, "invoices.id")?,
        code: row.get("code")?,
        pos_order_id: parse_uuid(&order_id_text, "invoices.pos_order_id")?,
        table_id: parse_optional_uuid(row.get("table_id")?, "invoices.table_id")?,
        subtotal: row.get("subtotal")?,
        discount: row.get("discount")?,
        total: row.get("total")?,
        payment_method: parse_enum(&method_text, "invoices.payment_method", PaymentMethod::parse)?,
        print_status: parse_enum(&print_text, "invoices.print_status", PrintStatus::parse)?,
        print_count: to_u32(row.get("print_count")?, "invoices.print_count")?,
        created_at: row.get("created_at")?,
        printed_at: row.get("printed_at")?,
    })
}
