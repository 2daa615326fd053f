//! Point-of-sale model: dining tables, open tabs and invoices.
//!
//! # Invariants
//! - A table has at most one `open` tab.
//! - A tab is invoiced at most once; its invoice code is unique.
//! - Invoice codes are sequential per calendar day: `HD<yyyymmdd>-<nnnn>`.

use super::cart::LineItem;
use super::order::{PaymentMethod, Totals};
use super::user::UserId;
use super::{now_ms, require_text, Amount, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TableId = Uuid;
pub type PosOrderId = Uuid;
pub type InvoiceId = Uuid;

const INVOICE_CODE_PREFIX: &str = "HD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
}

impl TableStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: TableId,
    pub name: String,
    pub capacity: u32,
    pub status: TableStatus,
    pub created_at: i64,
}

impl DiningTable {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            capacity,
            status: TableStatus::Available,
            created_at: now_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("table.name", &self.name)?;
        if self.capacity == 0 {
            return Err(ValidationError::Invalid("table capacity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosOrderStatus {
    Open,
    Invoiced,
    Cancelled,
}

impl PosOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Invoiced => "invoiced",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "invoiced" => Some(Self::Invoiced),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// In-store tab, optionally attached to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosOrder {
    pub id: PosOrderId,
    pub table_id: Option<TableId>,
    pub staff_id: Option<UserId>,
    pub items: Vec<LineItem>,
    pub status: PosOrderStatus,
    pub note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PosOrder {
    pub fn open(table_id: Option<TableId>, staff_id: Option<UserId>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            table_id,
            staff_id,
            items: Vec::new(),
            status: PosOrderStatus::Open,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PosOrderStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintStatus {
    NotPrinted,
    Printed,
}

impl PrintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotPrinted => "not_printed",
            Self::Printed => "printed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_printed" => Some(Self::NotPrinted),
            "printed" => Some(Self::Printed),
            _ => None,
        }
    }
}

/// Settled POS tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub code: String,
    pub pos_order_id: PosOrderId,
    pub table_id: Option<TableId>,
    pub subtotal: Amount,
    pub discount: Amount,
    pub total: Amount,
    pub payment_method: PaymentMethod,
    pub print_status: PrintStatus,
    pub print_count: u32,
    pub created_at: i64,
    pub printed_at: Option<i64>,
}

impl Invoice {
    pub fn for_order(
        order: &PosOrder,
        code: String,
        discount: Amount,
        payment_method: PaymentMethod,
    ) -> Self {
        let totals = Totals::compute(&order.items, discount);
        Self {
            id: Uuid::new_v4(),
            code,
            pos_order_id: order.id,
            table_id: order.table_id,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            payment_method,
            print_status: PrintStatus::NotPrinted,
            print_count: 0,
            created_at: now_ms(),
            printed_at: None,
        }
    }
}

/// Formats the invoice code for the `sequence`-th invoice of `day`.
pub fn format_invoice_code(day: NaiveDate, sequence: u32) -> String {
    format!("{INVOICE_CODE_PREFIX}{}-{sequence:04}", day.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::{format_invoice_code, DiningTable, Invoice, PosOrder};
    use crate::model::cart::LineItem;
    use crate::model::catalog::Product;
    use crate::model::order::PaymentMethod;
    use chrono::NaiveDate;

    #[test]
    fn invoice_code_is_zero_padded_per_day() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(format_invoice_code(day, 7), "HD20241201-0007");
        assert_eq!(format_invoice_code(day, 12345), "HD20241201-12345");
    }

    #[test]
    fn invoice_totals_follow_tab_items() {
        let product = Product::new("Cold brew", None, 50_000);
        let mut tab = PosOrder::open(None, None);
        tab.items
            .push(LineItem::from_product(&product, None, &[], 3).unwrap());

        let invoice = Invoice::for_order(&tab, "HD20240101-0001".to_string(), 20_000, PaymentMethod::Cash);
        assert_eq!(invoice.subtotal, 150_000);
        assert_eq!(invoice.total, 130_000);
        assert_eq!(invoice.print_count, 0);
    }

    #[test]
    fn table_requires_name_and_capacity() {
        assert!(DiningTable::new("  ", 2).validate().is_err());
        assert!(DiningTable::new("T1", 0).validate().is_err());
        assert!(DiningTable::new("T1", 4).validate().is_ok());
    }
}
