//! Order model and lifecycle state machine.
//!
//! # Invariants
//! - `total == subtotal - discount` and `0 <= discount <= subtotal`.
//! - Status only moves along [`OrderStatus::can_transition_to`].
//! - `completed` and `cancelled` are terminal.
//! - `points_awarded > 0` only for completed orders whose payment was paid.

use super::cart::{lines_subtotal, LineItem};
use super::user::UserId;
use super::{
    now_ms, require_non_negative, require_price, require_quantity, Amount, ValidationError,
};
use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OrderId = Uuid;

const ORDER_CODE_PREFIX: &str = "CF";
const ORDER_CODE_SUFFIX_LEN: usize = 4;

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Preparing,
        Self::Ready,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Allowed forward moves.
    ///
    /// `pending -> preparing` covers pay-at-counter orders whose payment is
    /// still pending while the drink is being made.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Pending, Self::Preparing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Paid, Self::Preparing)
                | (Self::Paid, Self::Cancelled)
                | (Self::Preparing, Self::Ready)
                | (Self::Ready, Self::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(Self::Cash),
            "bank_transfer" => Some(Self::BankTransfer),
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

/// Settlement state of an order payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

/// Monetary breakdown of an order or invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Amount,
    pub discount: Amount,
    pub total: Amount,
}

impl Totals {
    /// Computes totals, clamping `discount` into `[0, subtotal]`.
    pub fn compute(lines: &[LineItem], discount: Amount) -> Self {
        let subtotal = lines_subtotal(lines);
        let discount = discount.clamp(0, subtotal.max(0));
        Self {
            subtotal,
            discount,
            total: subtotal - discount,
        }
    }
}

/// Customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub code: String,
    pub user_id: Option<UserId>,
    pub items: Vec<LineItem>,
    pub subtotal: Amount,
    pub discount: Amount,
    pub total: Amount,
    pub payment: Payment,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub points_awarded: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Order {
    /// Creates a pending order with pending payment and a fresh code.
    pub fn new(
        user_id: Option<UserId>,
        items: Vec<LineItem>,
        discount: Amount,
        method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        let totals = Totals::compute(&items, discount);
        Self {
            id: Uuid::new_v4(),
            code: generate_order_code(now),
            user_id,
            items,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            payment: Payment {
                method,
                status: PaymentStatus::Pending,
            },
            status: OrderStatus::Pending,
            note: None,
            points_awarded: 0,
            created_at: now.timestamp_millis(),
            updated_at: now.timestamp_millis(),
            completed_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::Invalid("order must contain at least one item"));
        }
        for item in &self.items {
            require_quantity(item.quantity)?;
            require_price("item.unit_price", item.unit_price)?;
        }
        require_non_negative("order.discount", self.discount)?;
        if self.discount > self.subtotal || self.total != self.subtotal - self.discount {
            return Err(ValidationError::Invalid(
                "order totals are inconsistent with subtotal and discount",
            ));
        }
        Ok(())
    }

    pub fn is_paid(&self) -> bool {
        self.payment.status == PaymentStatus::Paid
    }

    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Moves to `next` and applies the payment side effects of the move.
    ///
    /// Returns `false` (and changes nothing) when the move is not allowed.
    pub fn apply_transition(&mut self, next: OrderStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = now_ms();
        match next {
            OrderStatus::Paid => self.payment.status = PaymentStatus::Paid,
            OrderStatus::Cancelled if self.is_paid() => {
                self.payment.status = PaymentStatus::Refunded
            }
            OrderStatus::Completed => self.completed_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        true
    }
}

/// Generates a short human-readable order code, e.g. `CF240315-7KQ2`.
pub fn generate_order_code(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_CODE_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect();
    format!("{ORDER_CODE_PREFIX}{}-{suffix}", now.format("%y%m%d"))
}
