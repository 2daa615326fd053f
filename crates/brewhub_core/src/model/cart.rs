//! Cart aggregation rules shared by storefront carts, orders and POS tabs.
//!
//! # Invariants
//! - One line per `(product_id, variant, sorted topping names)` key.
//! - Every stored line has `1 <= quantity <= MAX_LINE_QUANTITY`; merges and
//!   quantity edits are capped at the maximum.
//! - Toppings inside a line are kept sorted by name.

use super::catalog::{Product, ProductId, ProductOption};
use super::{require_quantity, Amount, ValidationError, MAX_LINE_QUANTITY};
use serde::{Deserialize, Serialize};

/// One configured product with quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    /// Name snapshot taken when the line was built.
    pub product_name: String,
    /// Base price snapshot, without modifiers.
    pub unit_price: Amount,
    #[serde(default)]
    pub variant: Option<ProductOption>,
    #[serde(default)]
    pub toppings: Vec<ProductOption>,
    pub quantity: u32,
}

/// Merge key for cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub toppings: Vec<String>,
}

impl LineItem {
    /// Builds a line for `product` after checking availability and options.
    pub fn from_product(
        product: &Product,
        variant: Option<&str>,
        toppings: &[String],
        quantity: u32,
    ) -> Result<Self, ValidationError> {
        if !product.is_available {
            return Err(ValidationError::ProductUnavailable(product.name.clone()));
        }
        require_quantity(quantity)?;

        let variant = match variant {
            Some(name) => Some(product.variant(name).cloned().ok_or_else(|| {
                ValidationError::UnknownOption {
                    product: product.name.clone(),
                    option: name.to_string(),
                }
            })?),
            None => None,
        };

        let mut selected = Vec::with_capacity(toppings.len());
        for name in toppings {
            let topping =
                product
                    .topping(name)
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownOption {
                        product: product.name.clone(),
                        option: name.clone(),
                    })?;
            if !selected.contains(&topping) {
                selected.push(topping);
            }
        }

        let mut line = Self {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.price,
            variant,
            toppings: selected,
            quantity,
        };
        line.normalize();
        Ok(line)
    }

    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id,
            variant: self.variant.as_ref().map(|option| option.name.clone()),
            toppings: self
                .toppings
                .iter()
                .map(|option| option.name.clone())
                .collect(),
        }
    }

    /// Price of one unit including variant and topping diffs.
    /// Saturates at `Amount::MAX` for rehydrated lines with foreign prices.
    pub fn unit_total(&self) -> Amount {
        let variant_diff = self.variant.as_ref().map_or(0, |option| option.price_diff);
        self.toppings
            .iter()
            .fold(self.unit_price.saturating_add(variant_diff), |acc, option| {
                acc.saturating_add(option.price_diff)
            })
    }

    pub fn line_total(&self) -> Amount {
        self.unit_total().saturating_mul(Amount::from(self.quantity))
    }

    fn normalize(&mut self) {
        self.toppings.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Sums line totals.
pub fn lines_subtotal(lines: &[LineItem]) -> Amount {
    lines
        .iter()
        .fold(0, |acc: Amount, line| acc.saturating_add(line.line_total()))
}

/// Client-side cart with merge-on-add semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from arbitrary lines, merging duplicates.
    pub fn from_lines(lines: impl IntoIterator<Item = LineItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line);
        }
        cart
    }

    /// Restores a persisted cart, re-merging duplicate rows.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let lines: Vec<LineItem> = serde_json::from_str(raw)?;
        Ok(Self::from_lines(lines))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.lines)
    }

    /// Adds a line; an equivalent configuration increments quantity instead.
    ///
    /// Zero-quantity lines are ignored.
    pub fn add(&mut self, mut line: LineItem) {
        if line.quantity == 0 {
            return;
        }
        line.normalize();
        let key = line.key();
        match self.lines.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .saturating_add(line.quantity)
                    .min(MAX_LINE_QUANTITY);
            }
            None => {
                line.quantity = line.quantity.min(MAX_LINE_QUANTITY);
                self.lines.push(line);
            }
        }
    }

    /// Sets the quantity of one line. Zero removes it; larger values are
    /// capped at `MAX_LINE_QUANTITY`.
    ///
    /// Returns `false` when no line matches `key`.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(key);
        }
        match self.lines.iter_mut().find(|line| &line.key() == key) {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.key() != key);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<LineItem> {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across lines.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn total(&self) -> Amount {
        lines_subtotal(&self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cart, LineItem};
    use crate::model::catalog::{Product, ProductOption};
    use crate::model::{ValidationError, MAX_LINE_QUANTITY};

    fn latte() -> Product {
        let mut product = Product::new("Latte", None, 40_000);
        product.variants = vec![
            ProductOption::new("M", 0),
            ProductOption::new("L", 10_000),
        ];
        product.toppings = vec![
            ProductOption::new("Pearl", 5_000),
            ProductOption::new("Cheese foam", 8_000),
        ];
        product
    }

    fn toppings(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn adding_identical_configuration_twice_yields_one_row() {
        let product = latte();
        let mut cart = Cart::new();
        let line = LineItem::from_product(&product, Some("L"), &toppings(&["Pearl"]), 1).unwrap();
        cart.add(line.clone());
        cart.add(line);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn topping_order_does_not_split_rows() {
        let product = latte();
        let mut cart = Cart::new();
        cart.add(
            LineItem::from_product(&product, None, &toppings(&["Pearl", "Cheese foam"]), 1)
                .unwrap(),
        );
        cart.add(
            LineItem::from_product(&product, None, &toppings(&["Cheese foam", "Pearl"]), 2)
                .unwrap(),
        );

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn different_variant_creates_new_row() {
        let product = latte();
        let mut cart = Cart::new();
        cart.add(LineItem::from_product(&product, Some("M"), &[], 1).unwrap());
        cart.add(LineItem::from_product(&product, Some("L"), &[], 1).unwrap());
        assert_eq!(cart.lines().len(), 2);
    }

    #[test]
    fn total_includes_variant_and_topping_diffs() {
        let product = latte();
        let mut cart = Cart::new();
        // (40_000 + 10_000 + 5_000 + 8_000) * 2
        cart.add(
            LineItem::from_product(&product, Some("L"), &toppings(&["Pearl", "Cheese foam"]), 2)
                .unwrap(),
        );
        // 40_000 * 1
        cart.add(LineItem::from_product(&product, None, &[], 1).unwrap());

        assert_eq!(cart.total(), 126_000 + 40_000);
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let product = latte();
        let mut cart = Cart::new();
        let line = LineItem::from_product(&product, None, &[], 3).unwrap();
        let key = line.key();
        cart.add(line);

        assert!(cart.set_quantity(&key, 5));
        assert_eq!(cart.item_count(), 5);
        assert!(cart.set_quantity(&key, 0));
        assert!(cart.is_empty());
        assert!(!cart.remove(&key));
    }

    #[test]
    fn rehydration_merges_duplicate_rows() {
        let product = latte();
        let line = LineItem::from_product(&product, Some("M"), &[], 1).unwrap();
        let raw = serde_json::to_string(&vec![line.clone(), line]).unwrap();

        let cart = Cart::from_json(&raw).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);

        let restored = Cart::from_json(&cart.to_json().unwrap()).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn from_product_rejects_unknown_options_and_unavailable_products() {
        let mut product = latte();
        let err = LineItem::from_product(&product, Some("XL"), &[], 1).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownOption { .. }));

        product.is_available = false;
        let err = LineItem::from_product(&product, None, &[], 1).unwrap_err();
        assert_eq!(err, ValidationError::ProductUnavailable("Latte".to_string()));
    }

    #[test]
    fn quantities_are_bounded_per_line() {
        let product = latte();
        assert_eq!(
            LineItem::from_product(&product, None, &[], MAX_LINE_QUANTITY + 1).unwrap_err(),
            ValidationError::InvalidQuantity(MAX_LINE_QUANTITY + 1)
        );

        let line = LineItem::from_product(&product, None, &[], MAX_LINE_QUANTITY).unwrap();
        let mut cart = Cart::from_lines([line.clone(), line.clone()]);
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);

        assert!(cart.set_quantity(&line.key(), u32::MAX));
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(cart.total(), 40_000 * i64::from(MAX_LINE_QUANTITY));
    }

    #[test]
    fn foreign_prices_in_rehydrated_carts_do_not_overflow() {
        let mut line = LineItem::from_product(&latte(), None, &toppings(&["Pearl"]), 1).unwrap();
        line.unit_price = i64::MAX / 2 + 1;
        line.toppings[0].price_diff = i64::MAX / 2 + 1;
        line.quantity = u32::MAX;

        let raw = serde_json::to_string(&vec![line]).unwrap();
        let cart = Cart::from_json(&raw).unwrap();
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(cart.total(), i64::MAX);
    }
}
