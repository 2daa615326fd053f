//! Category and product repository with SQLite implementation.
//!
//! # Invariants
//! - Category slugs are unique.
//! - Product variants/toppings are stored as JSON arrays.
//! - Deleting a category detaches its products instead of deleting them.

use super::common::{
    bool_to_int, ensure_connection_ready, from_json, map_write_error, parse_bool,
    parse_optional_uuid, parse_uuid, to_json, RepoError, RepoResult,
};
use crate::model::catalog::{Category, CategoryId, Product, ProductId, ProductOption};
use crate::model::now_ms;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const PRODUCT_SELECT_SQL: &str = "SELECT
    id,
    name,
    category_id,
    price,
    description,
    image_url,
    variants_json,
    toppings_json,
    is_available,
    created_at,
    updated_at
FROM products";

const CATEGORY_SELECT_SQL: &str = "SELECT id, name, slug, sort_order, created_at FROM categories";

/// Query options for menu listings.
#[derive(Debug, Clone, Default)]
pub struct ProductListQuery {
    pub category_id: Option<CategoryId>,
    pub available_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for the menu catalog.
pub trait CatalogRepository {
    fn create_category(&self, category: &Category) -> RepoResult<CategoryId>;
    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    fn find_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>>;
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    fn delete_category(&self, id: CategoryId) -> RepoResult<()>;
    fn create_product(&self, product: &Product) -> RepoResult<ProductId>;
    fn update_product(&self, product: &Product) -> RepoResult<()>;
    fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>>;
    fn list_products(&self, query: &ProductListQuery) -> RepoResult<Vec<Product>>;
    fn set_product_availability(&self, id: ProductId, is_available: bool) -> RepoResult<()>;
    fn delete_product(&self, id: ProductId) -> RepoResult<()>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["categories", "products", "products_fts"])?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_category(&self, category: &Category) -> RepoResult<CategoryId> {
        category.validate()?;
        self.conn
            .execute(
                "INSERT INTO categories (id, name, slug, sort_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    category.id.to_string(),
                    category.name.as_str(),
                    category.slug.as_str(),
                    category.sort_order,
                    category.created_at,
                ],
            )
            .map_err(|err| {
                map_write_error(err, format!("category `{}` already exists", category.slug))
            })?;
        Ok(category.id)
    }

    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_category_row(row)))
            .optional()?;
        row.transpose()
    }

    fn find_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CATEGORY_SELECT_SQL} WHERE slug = ?1;"))?;
        let row = stmt
            .query_row([slug], |row| Ok(read_category_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL} ORDER BY sort_order ASC, name COLLATE NOCASE ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(read_category_row(row)?);
        }
        Ok(categories)
    }

    fn delete_category(&self, id: CategoryId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE products SET category_id = NULL WHERE category_id = ?1;",
            [id.to_string()],
        )?;
        let changed = tx.execute("DELETE FROM categories WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("category", id));
        }
        tx.commit()?;
        Ok(())
    }

    fn create_product(&self, product: &Product) -> RepoResult<ProductId> {
        product.validate()?;
        self.conn.execute(
            "INSERT INTO products (
                id,
                name,
                category_id,
                price,
                description,
                image_url,
                variants_json,
                toppings_json,
                is_available,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                product.id.to_string(),
                product.name.as_str(),
                product.category_id.map(|id| id.to_string()),
                product.price,
                product.description.as_deref(),
                product.image_url.as_deref(),
                to_json(&product.variants, "products.variants_json")?,
                to_json(&product.toppings, "products.toppings_json")?,
                bool_to_int(product.is_available),
                product.created_at,
                product.updated_at,
            ],
        )?;
        Ok(product.id)
    }

    fn update_product(&self, product: &Product) -> RepoResult<()> {
        product.validate()?;
        let changed = self.conn.execute(
            "UPDATE products
             SET
                name = ?1,
                category_id = ?2,
                price = ?3,
                description = ?4,
                image_url = ?5,
                variants_json = ?6,
                toppings_json = ?7,
                is_available = ?8,
                updated_at = ?9
             WHERE id = ?10;",
            params![
                product.name.as_str(),
                product.category_id.map(|id| id.to_string()),
                product.price,
                product.description.as_deref(),
                product.image_url.as_deref(),
                to_json(&product.variants, "products.variants_json")?,
                to_json(&product.toppings, "products.toppings_json")?,
                bool_to_int(product.is_available),
                now_ms(),
                product.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("product", product.id));
        }
        Ok(())
    }

    fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PRODUCT_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_product_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_products(&self, query: &ProductListQuery) -> RepoResult<Vec<Product>> {
        let mut sql = format!("{PRODUCT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.available_only {
            sql.push_str(" AND is_available = 1");
        }
        if let Some(category_id) = query.category_id {
            sql.push_str(" AND category_id = ?");
            bind_values.push(Value::Text(category_id.to_string()));
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC");

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
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(read_product_row(row)?);
        }
        Ok(products)
    }

    fn set_product_availability(&self, id: ProductId, is_available: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE products SET is_available = ?1, updated_at = ?2 WHERE id = ?3;",
            params![bool_to_int(is_available), now_ms(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("product", id));
        }
        Ok(())
    }

    fn delete_product(&self, id: ProductId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("product", id));
        }
        Ok(())
    }
}

fn read_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let id_text: String = row.get("id")?;
    Ok(Category {
        id: parse_uuid(&id_text, "categories.id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
    })
}

fn read_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let id_text: String = row.get("id")?;
    let variants_json: String = row.get("variants_json")?;
    let toppings_json: String = row.get("toppings_json")?;

    let product = Product {
        id: parse_uuid(&id_text, "products.id")?,
        name: row.get("name")?,
        category_id: parse_optional_uuid(row.get("category_id")?, "products.category_id")?,
        price: row.get("price")?,
        description: row.get("description")?,
        image_url: row.get("image_url")?,
        variants: from_json::<Vec<ProductOption>>(&variants_json, "products.variants_json")?,
        toppings: from_json::<Vec<ProductOption>>(&toppings_json, "products.toppings_json")?,
        is_available: parse_bool(row.get("is_available")?, "products.is_available")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    product.validate()?;
    Ok(product)
}
