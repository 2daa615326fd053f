//! Menu catalog model: categories and products.
//!
//! # Invariants
//! - Category slugs are lowercase ASCII words joined by `-`.
//! - Option names are unique per product (variants and toppings separately).
//! - Prices and option price diffs are non-negative.

use super::{now_ms, require_price, require_text, Amount, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub type CategoryId = Uuid;
pub type ProductId = Uuid;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Menu category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub sort_order: i64,
    pub created_at: i64,
}

impl Category {
    pub fn new(name: impl Into<String>, sort_order: i64) -> Self {
        let name = name.into().trim().to_string();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            sort_order,
            created_at: now_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("category.name", &self.name)?;
        require_text("category.slug", &self.slug)?;
        Ok(())
    }
}

/// Named price modifier: a size variant or a topping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    pub price_diff: Amount,
}

impl ProductOption {
    pub fn new(name: impl Into<String>, price_diff: Amount) -> Self {
        Self {
            name: name.into(),
            price_diff,
        }
    }
}

/// Sellable menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub price: Amount,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub variants: Vec<ProductOption>,
    pub toppings: Vec<ProductOption>,
    pub is_available: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// Creates an available product without options.
    pub fn new(name: impl Into<String>, category_id: Option<CategoryId>, price: Amount) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category_id,
            price,
            description: None,
            image_url: None,
            variants: Vec::new(),
            toppings: Vec::new(),
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("product.name", &self.name)?;
        require_price("product.price", self.price)?;
        validate_options(&self.name, &self.variants)?;
        validate_options(&self.name, &self.toppings)?;
        Ok(())
    }

    pub fn variant(&self, name: &str) -> Option<&ProductOption> {
        self.variants.iter().find(|option| option.name == name)
    }

    pub fn topping(&self, name: &str) -> Option<&ProductOption> {
        self.toppings.iter().find(|option| option.name == name)
    }
}

fn validate_options(product: &str, options: &[ProductOption]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for option in options {
        require_text("option.name", &option.name)?;
        require_price("option.price_diff", option.price_diff)?;
        if !seen.insert(option.name.as_str()) {
            return Err(ValidationError::DuplicateOption {
                product: product.to_string(),
                option: option.name.clone(),
            });
        }
    }
    Ok(())
}

/// Derives a URL-safe slug from a category name.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_SLUG_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{slugify, Product, ProductOption};
    use crate::model::{ValidationError, MAX_PRICE};

    #[test]
    fn slugify_collapses_symbols_and_case() {
        assert_eq!(slugify("  Milk Tea & Friends "), "milk-tea-friends");
        assert_eq!(slugify("Coffee"), "coffee");
    }

    #[test]
    fn product_rejects_duplicate_topping_names() {
        let mut product = Product::new("Latte", None, 45_000);
        product.toppings = vec![
            ProductOption::new("Pearl", 5_000),
            ProductOption::new("Pearl", 7_000),
        ];
        let err = product.validate().unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateOption { .. }));
    }

    #[test]
    fn product_rejects_negative_price() {
        let product = Product::new("Latte", None, -1);
        assert_eq!(
            product.validate().unwrap_err(),
            ValidationError::NegativeAmount {
                field: "product.price",
                value: -1
            }
        );
    }

    #[test]
    fn product_rejects_prices_above_the_cap() {
        let mut product = Product::new("Latte", None, MAX_PRICE);
        assert!(product.validate().is_ok());

        product.toppings = vec![ProductOption::new("Gold leaf", i64::MAX / 2 + 1)];
        assert_eq!(
            product.validate().unwrap_err(),
            ValidationError::AmountTooLarge {
                field: "option.price_diff",
                value: i64::MAX / 2 + 1
            }
        );

        product.toppings.clear();
        product.price = MAX_PRICE + 1;
        assert!(matches!(
            product.validate(),
            Err(ValidationError::AmountTooLarge { field: "product.price", .. })
        ));
    }
}
