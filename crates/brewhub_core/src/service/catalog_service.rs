//! Menu catalog use-cases: categories, products and line building.
//!
//! # Responsibility
//! - Gate catalog writes behind `manage_catalog`.
//! - Seed default categories idempotently.
//! - Serve the storefront menu (available products only for customers).
//!
//! # Invariants
//! - Seeding never duplicates a category; existing slugs are skipped.
//! - Product image URLs, when set, are absolute `http(s)` URLs.

use crate::access::{AccessError, Actor, Permission};
use crate::model::cart::LineItem;
use crate::model::catalog::{slugify, Category, CategoryId, Product, ProductId};
use crate::model::ValidationError;
use crate::repo::catalog_repo::{CatalogRepository, ProductListQuery};
use crate::repo::common::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use url::Url;

/// Categories created by [`CatalogService::seed_default_categories`].
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Coffee",
    "Tea",
    "Milk Tea",
    "Smoothies",
    "Pastries",
    "Seasonal",
];

#[derive(Debug)]
pub enum CatalogServiceError {
    Validation(ValidationError),
    Access(AccessError),
    CategoryNotFound(String),
    ProductNotFound(String),
    /// Category slug already exists.
    DuplicateCategory(String),
    InvalidImageUrl(String),
    Repo(RepoError),
}

impl Display for CatalogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::DuplicateCategory(slug) => write!(f, "category `{slug}` already exists"),
            Self::InvalidImageUrl(value) => write!(f, "invalid image url `{value}`"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "category",
                id,
            } => Self::CategoryNotFound(id),
            RepoError::NotFound { id, .. } => Self::ProductNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for CatalogServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessError> for CatalogServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: Vec<String>,
    pub skipped: Vec<String>,
}

/// Catalog service facade over a catalog repository.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Inserts every default category whose slug is not present yet.
    pub fn seed_default_categories(
        &self,
        actor: &Actor,
    ) -> Result<SeedReport, CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        let mut report = SeedReport::default();

        for (index, name) in DEFAULT_CATEGORIES.iter().enumerate() {
            let slug = slugify(name);
            if self.repo.find_category_by_slug(&slug)?.is_some() {
                report.skipped.push(slug);
                continue;
            }
            let category = Category::new(*name, index as i64);
            self.repo.create_category(&category)?;
            report.inserted.push(slug);
        }

        info!(
            "event=catalog_seed module=catalog status=ok inserted={} skipped={}",
            report.inserted.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub fn create_category(
        &self,
        actor: &Actor,
        name: &str,
        sort_order: i64,
    ) -> Result<Category, CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        let category = Category::new(name, sort_order);
        category.validate()?;
        match self.repo.create_category(&category) {
            Ok(_) => {}
            Err(RepoError::Conflict(_)) => {
                return Err(CatalogServiceError::DuplicateCategory(category.slug))
            }
            Err(err) => return Err(err.into()),
        }
        info!(
            "event=category_create module=catalog status=ok category_id={}",
            category.id
        );
        Ok(category)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, CatalogServiceError> {
        Ok(self.repo.list_categories()?)
    }

    /// Deletes a category; its products become uncategorized.
    pub fn delete_category(
        &self,
        actor: &Actor,
        id: CategoryId,
    ) -> Result<(), CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        self.repo.delete_category(id)?;
        info!("event=category_delete module=catalog status=ok category_id={id}");
        Ok(())
    }

    pub fn create_product(
        &self,
        actor: &Actor,
        product: Product,
    ) -> Result<Product, CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        let product = self.prepare_product(product)?;
        self.repo.create_product(&product)?;
        info!(
            "event=product_create module=catalog status=ok product_id={}",
            product.id
        );
        self.require_product(product.id)
    }

    /// Full replacement of product fields.
    pub fn update_product(
        &self,
        actor: &Actor,
        product: Product,
    ) -> Result<Product, CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        let product = self.prepare_product(product)?;
        self.repo.update_product(&product)?;
        info!(
            "event=product_update module=catalog status=ok product_id={}",
            product.id
        );
        self.require_product(product.id)
    }

    pub fn set_product_availability(
        &self,
        actor: &Actor,
        id: ProductId,
        is_available: bool,
    ) -> Result<Product, CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        self.repo.set_product_availability(id, is_available)?;
        info!(
            "event=product_availability module=catalog status=ok product_id={id} available={is_available}"
        );
        self.require_product(id)
    }

    pub fn delete_product(&self, actor: &Actor, id: ProductId) -> Result<(), CatalogServiceError> {
        actor.ensure(Permission::ManageCatalog)?;
        self.repo.delete_product(id)?;
        info!("event=product_delete module=catalog status=ok product_id={id}");
        Ok(())
    }

    pub fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogServiceError> {
        Ok(self.repo.get_product(id)?)
    }

    /// Menu listing. Unavailable products are shown to catalog managers only.
    pub fn list_menu(
        &self,
        viewer: Option<&Actor>,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Product>, CatalogServiceError> {
        let can_manage = viewer.is_some_and(|actor| actor.allows(Permission::ManageCatalog));
        let query = ProductListQuery {
            category_id,
            available_only: !can_manage,
            ..ProductListQuery::default()
        };
        Ok(self.repo.list_products(&query)?)
    }

    /// Builds a priced line from the current catalog entry of `product_id`.
    pub fn build_line(
        &self,
        product_id: ProductId,
        variant: Option<&str>,
        toppings: &[String],
        quantity: u32,
    ) -> Result<LineItem, CatalogServiceError> {
        let product = self.require_product(product_id)?;
        Ok(LineItem::from_product(&product, variant, toppings, quantity)?)
    }

    fn prepare_product(&self, mut product: Product) -> Result<Product, CatalogServiceError> {
        product.name = product.name.trim().to_string();
        product.description = product
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        product.image_url = product
            .image_url
            .map(|raw| normalize_image_url(&raw))
            .transpose()?
            .flatten();
        product.validate()?;

        if let Some(category_id) = product.category_id {
            if self.repo.get_category(category_id)?.is_none() {
                return Err(CatalogServiceError::CategoryNotFound(
                    category_id.to_string(),
                ));
            }
        }
        Ok(product)
    }

    fn require_product(&self, id: ProductId) -> Result<Product, CatalogServiceError> {
        self.repo
            .get_product(id)?
            .ok_or_else(|| CatalogServiceError::ProductNotFound(id.to_string()))
    }
}

/// Blank input clears the image; anything else must be an absolute http(s) URL.
fn normalize_image_url(raw: &str) -> Result<Option<String>, CatalogServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed =
        Url::parse(trimmed).map_err(|_| CatalogServiceError::InvalidImageUrl(trimmed.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CatalogServiceError::InvalidImageUrl(trimmed.to_string()));
    }
    Ok(Some(parsed.to_string()))
}
