//! In-store point of sale: tables, tabs, checkout and invoice printing.
//!
//! # Responsibility
//! - Manage dining tables and one open tab per table.
//! - Price tab items from the live catalog with cart merge semantics.
//! - Settle tabs into sequentially numbered invoices.
//!
//! # Invariants
//! - Every operation requires `operate_pos`.
//! - Only open tabs accept item changes, cancellation or checkout.
//! - Invoice numbering restarts every calendar day in the store offset.

use crate::access::{AccessError, Actor, Permission};
use crate::model::cart::{Cart, LineItem, LineKey};
use crate::model::catalog::ProductId;
use crate::model::order::PaymentMethod;
use crate::model::pos::{
    format_invoice_code, DiningTable, Invoice, InvoiceId, PosOrder, PosOrderId, PosOrderStatus,
    TableId,
};
use crate::model::{now_ms, Amount, ValidationError};
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::common::RepoError;
use crate::repo::pos_repo::PosRepository;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_INVOICE_CODE_ATTEMPTS: u32 = 5;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug)]
pub enum PosServiceError {
    Validation(ValidationError),
    Access(AccessError),
    TableNotFound(TableId),
    TableNameTaken(String),
    TableBusy(TableId),
    PosOrderNotFound(PosOrderId),
    InvoiceNotFound(InvoiceId),
    ProductNotFound(ProductId),
    /// Tab is already invoiced or cancelled.
    OrderClosed(PosOrderId),
    LineNotFound,
    EmptyOrder(PosOrderId),
    Repo(RepoError),
}

impl Display for PosServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::TableNotFound(id) => write!(f, "table not found: {id}"),
            Self::TableNameTaken(name) => write!(f, "table `{name}` already exists"),
            Self::TableBusy(id) => write!(f, "table {id} has an open tab"),
            Self::PosOrderNotFound(id) => write!(f, "pos order not found: {id}"),
            Self::InvoiceNotFound(id) => write!(f, "invoice not found: {id}"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::OrderClosed(id) => write!(f, "pos order {id} is closed"),
            Self::LineNotFound => write!(f, "line not found on pos order"),
            Self::EmptyOrder(id) => write!(f, "pos order {id} has no items"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PosServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PosServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for PosServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessError> for PosServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

/// Item to put on a tab.
#[derive(Debug, Clone)]
pub struct PosItemRequest {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub toppings: Vec<String>,
    pub quantity: u32,
}

pub struct PosService<P: PosRepository, C: CatalogRepository> {
    pos: P,
    catalog: C,
    utc_offset: FixedOffset,
}

impl<P: PosRepository, C: CatalogRepository> PosService<P, C> {
    /// `utc_offset` decides which calendar day an invoice belongs to.
    pub fn new(pos: P, catalog: C, utc_offset: FixedOffset) -> Self {
        Self {
            pos,
            catalog,
            utc_offset,
        }
    }

    pub fn create_table(
        &self,
        actor: &Actor,
        name: &str,
        capacity: u32,
    ) -> Result<DiningTable, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let table = DiningTable::new(name, capacity);
        table.validate()?;
        match self.pos.create_table(&table) {
            Ok(_) => {}
            Err(RepoError::Conflict(_)) => return Err(PosServiceError::TableNameTaken(table.name)),
            Err(err) => return Err(err.into()),
        }
        info!("event=pos_table_create module=pos status=ok table_id={}", table.id);
        Ok(table)
    }

    pub fn list_tables(&self, actor: &Actor) -> Result<Vec<DiningTable>, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        Ok(self.pos.list_tables()?)
    }

    pub fn delete_table(&self, actor: &Actor, id: TableId) -> Result<(), PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        match self.pos.delete_table(id) {
            Ok(()) => {}
            Err(RepoError::Conflict(_)) => return Err(PosServiceError::TableBusy(id)),
            Err(RepoError::NotFound { .. }) => return Err(PosServiceError::TableNotFound(id)),
            Err(err) => return Err(err.into()),
        }
        info!("event=pos_table_delete module=pos status=ok table_id={id}");
        Ok(())
    }

    /// Opens a tab, or returns the table's current open tab.
    ///
    /// `None` opens a takeaway tab without a table.
    pub fn open_order(
        &self,
        actor: &Actor,
        table_id: Option<TableId>,
    ) -> Result<PosOrder, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        if let Some(table_id) = table_id {
            if self.pos.get_table(table_id)?.is_none() {
                return Err(PosServiceError::TableNotFound(table_id));
            }
            if let Some(existing) = self.pos.find_open_for_table(table_id)? {
                return Ok(existing);
            }
        }

        let staff_id = (!actor.user_id.is_nil()).then_some(actor.user_id);
        let order = PosOrder::open(table_id, staff_id);
        self.pos.create_pos_order(&order)?;
        info!(
            "event=pos_order_open module=pos status=ok pos_order_id={} has_table={}",
            order.id,
            table_id.is_some()
        );
        self.require_order(order.id)
    }

    pub fn get_order(&self, actor: &Actor, id: PosOrderId) -> Result<PosOrder, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        self.require_order(id)
    }

    pub fn list_open_orders(&self, actor: &Actor) -> Result<Vec<PosOrder>, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        Ok(self.pos.list_open_orders()?)
    }

    /// Adds an item; the same configuration bumps the existing line.
    pub fn add_item(
        &self,
        actor: &Actor,
        id: PosOrderId,
        request: &PosItemRequest,
    ) -> Result<PosOrder, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let mut order = self.require_open_order(id)?;
        let product = self
            .catalog
            .get_product(request.product_id)?
            .ok_or(PosServiceError::ProductNotFound(request.product_id))?;
        let line = LineItem::from_product(
            &product,
            request.variant.as_deref(),
            &request.toppings,
            request.quantity,
        )?;

        let mut cart = Cart::from_lines(std::mem::take(&mut order.items));
        cart.add(line);
        order.items = cart.into_lines();
        self.save(order)
    }

    /// Sets a line quantity; zero removes the line.
    pub fn set_item_quantity(
        &self,
        actor: &Actor,
        id: PosOrderId,
        key: &LineKey,
        quantity: u32,
    ) -> Result<PosOrder, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let mut order = self.require_open_order(id)?;
        let mut cart = Cart::from_lines(std::mem::take(&mut order.items));
        if !cart.set_quantity(key, quantity) {
            return Err(PosServiceError::LineNotFound);
        }
        order.items = cart.into_lines();
        self.save(order)
    }

    pub fn set_note(
        &self,
        actor: &Actor,
        id: PosOrderId,
        note: Option<String>,
    ) -> Result<PosOrder, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let mut order = self.require_open_order(id)?;
        order.note = note
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        self.save(order)
    }

    /// Cancels an open tab and frees its table.
    pub fn cancel_order(&self, actor: &Actor, id: PosOrderId) -> Result<PosOrder, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let mut order = self.require_open_order(id)?;
        order.status = PosOrderStatus::Cancelled;
        let order = self.save(order)?;
        info!("event=pos_order_cancel module=pos status=ok pos_order_id={id}");
        Ok(order)
    }

    /// Settles an open tab into an invoice and frees its table.
    pub fn checkout(
        &self,
        actor: &Actor,
        id: PosOrderId,
        discount: Amount,
        payment_method: PaymentMethod,
    ) -> Result<Invoice, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let order = self.require_open_order(id)?;
        if order.items.is_empty() {
            return Err(PosServiceError::EmptyOrder(id));
        }

        let now = now_ms();
        let day = self.local_day(now);
        let (day_start, day_end) = day_bounds_ms(day, self.utc_offset);
        let mut sequence = self.pos.count_invoices_between(day_start, day_end)? + 1;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let invoice = Invoice::for_order(
                &order,
                format_invoice_code(day, sequence),
                discount,
                payment_method,
            );
            match self.pos.settle(&invoice) {
                Ok(_) => {
                    info!(
                        "event=pos_checkout module=pos status=ok pos_order_id={} invoice_id={} code={} total={}",
                        id, invoice.id, invoice.code, invoice.total
                    );
                    return Ok(invoice);
                }
                Err(RepoError::Conflict(message)) if attempt < MAX_INVOICE_CODE_ATTEMPTS => {
                    if self.pos.get_pos_order(id)?.is_some_and(|current| !current.is_open()) {
                        return Err(PosServiceError::OrderClosed(id));
                    }
                    warn!(
                        "event=pos_checkout module=pos status=retry attempt={attempt} error_code=invoice_code_taken detail={message}"
                    );
                    sequence += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn get_invoice(&self, actor: &Actor, id: InvoiceId) -> Result<Invoice, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        self.pos
            .get_invoice(id)?
            .ok_or(PosServiceError::InvoiceNotFound(id))
    }

    /// Records one print of the invoice.
    pub fn mark_printed(&self, actor: &Actor, id: InvoiceId) -> Result<Invoice, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        let invoice = match self.pos.mark_printed(id) {
            Ok(invoice) => invoice,
            Err(RepoError::NotFound { .. }) => return Err(PosServiceError::InvoiceNotFound(id)),
            Err(err) => return Err(err.into()),
        };
        info!(
            "event=pos_invoice_print module=pos status=ok invoice_id={} print_count={}",
            id, invoice.print_count
        );
        Ok(invoice)
    }

    /// Invoices issued on calendar days `start..=end`.
    pub fn list_invoices(
        &self,
        actor: &Actor,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Invoice>, PosServiceError> {
        actor.ensure(Permission::OperatePos)?;
        if end < start {
            return Ok(Vec::new());
        }
        let (from_ms, _) = day_bounds_ms(start, self.utc_offset);
        let (_, to_ms) = day_bounds_ms(end, self.utc_offset);
        Ok(self.pos.list_invoices(from_ms, to_ms)?)
    }

    fn local_day(&self, epoch_ms: i64) -> NaiveDate {
        DateTime::from_timestamp_millis(epoch_ms)
            .unwrap_or_default()
            .with_timezone(&self.utc_offset)
            .date_naive()
    }

    fn save(&self, mut order: PosOrder) -> Result<PosOrder, PosServiceError> {
        order.updated_at = now_ms();
        self.pos.save_pos_order(&order)?;
        self.require_order(order.id)
    }

    fn require_order(&self, id: PosOrderId) -> Result<PosOrder, PosServiceError> {
        self.pos
            .get_pos_order(id)?
            .ok_or(PosServiceError::PosOrderNotFound(id))
    }

    fn require_open_order(&self, id: PosOrderId) -> Result<PosOrder, PosServiceError> {
        let order = self.require_order(id)?;
        if !order.is_open() {
            return Err(PosServiceError::OrderClosed(id));
        }
        Ok(order)
    }
}

/// Epoch-ms bounds `[start, end)` of `day` in `offset`.
fn day_bounds_ms(day: NaiveDate, offset: FixedOffset) -> (i64, i64) {
    let local_midnight = day.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let start = local_midnight - i64::from(offset.local_minus_utc()) * 1000;
    (start, start + DAY_MS)
}
