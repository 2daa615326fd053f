//! Domain model for the storefront, back office and POS.
//!
//! # Responsibility
//! - Define canonical records shared by services and repositories.
//! - Hold pure business rules (cart merge, order transitions, loyalty tiers).
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Money is integer currency units (`Amount`), never floating point.
//! - Timestamps are Unix epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cart;
pub mod catalog;
pub mod loyalty;
pub mod order;
pub mod pos;
pub mod review;
pub mod settings;
pub mod user;

/// Money amount in the smallest currency unit used by the shop.
pub type Amount = i64;

/// Upper bound for catalog prices and option price diffs.
pub const MAX_PRICE: Amount = 1_000_000_000;

/// Upper bound for the quantity of one cart, order or tab line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Current wall clock as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Field-level validation failure for domain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Money field is negative.
    NegativeAmount { field: &'static str, value: Amount },
    /// Price field exceeds `MAX_PRICE`.
    AmountTooLarge { field: &'static str, value: Amount },
    /// Phone number does not match the accepted format.
    InvalidPhone(String),
    /// Password does not satisfy the minimum policy.
    WeakPassword { min_len: usize },
    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    InvalidQuantity(u32),
    /// Review rating outside `1..=5`.
    InvalidRating(u8),
    /// Two options of one product share a name.
    DuplicateOption { product: String, option: String },
    /// Requested variant/topping does not exist on the product.
    UnknownOption { product: String, option: String },
    /// Product cannot be ordered right now.
    ProductUnavailable(String),
    /// Free-form rule violation with a stable reason.
    Invalid(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::NegativeAmount { field, value } => {
                write!(f, "`{field}` must not be negative, got {value}")
            }
            Self::AmountTooLarge { field, value } => {
                write!(f, "`{field}` must not exceed {MAX_PRICE}, got {value}")
            }
            Self::InvalidPhone(value) => write!(f, "invalid phone number `{value}`"),
            Self::WeakPassword { min_len } => {
                write!(f, "password must contain at least {min_len} characters")
            }
            Self::InvalidQuantity(value) => write!(
                f,
                "quantity must be within 1..={MAX_LINE_QUANTITY}, got {value}"
            ),
            Self::InvalidRating(value) => write!(f, "rating must be within 1..=5, got {value}"),
            Self::DuplicateOption { product, option } => {
                write!(f, "product `{product}` declares option `{option}` twice")
            }
            Self::UnknownOption { product, option } => {
                write!(f, "product `{product}` has no option `{option}`")
            }
            Self::ProductUnavailable(name) => write!(f, "product `{name}` is not available"),
            Self::Invalid(reason) => write!(f, "{reason}"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    field: &'static str,
    value: Amount,
) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeAmount { field, value });
    }
    Ok(())
}

pub(crate) fn require_price(field: &'static str, value: Amount) -> Result<(), ValidationError> {
    require_non_negative(field, value)?;
    if value > MAX_PRICE {
        return Err(ValidationError::AmountTooLarge { field, value });
    }
    Ok(())
}

pub(crate) fn require_quantity(value: u32) -> Result<(), ValidationError> {
    if value == 0 || value > MAX_LINE_QUANTITY {
        return Err(ValidationError::InvalidQuantity(value));
    }
    Ok(())
}
