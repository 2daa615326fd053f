use brewhub_core::repo::catalog_repo::SqliteCatalogRepository;
use brewhub_core::service::catalog_service::{CatalogService, CatalogServiceError};
use brewhub_core::{
    open_db_in_memory, Actor, Cart, Product, ProductOption, UserRole, ValidationError,
};
use rusqlite::Connection;
use uuid::Uuid;

fn service(conn: &Connection) -> CatalogService<SqliteCatalogRepository<'_>> {
    CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap())
}

fn customer() -> Actor {
    Actor::new(Uuid::new_v4(), UserRole::Customer)
}

fn latte(category_id: Option<Uuid>) -> Product {
    let mut product = Product::new("Latte", category_id, 45_000);
    product.variants = vec![
        ProductOption::new("M", 0),
        ProductOption::new("L", 10_000),
    ];
    product.toppings = vec![
        ProductOption::new("Pearl", 5_000),
        ProductOption::new("Cheese Foam", 8_000),
    ];
    product
}

#[test]
fn seeding_default_categories_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();

    let first = catalog.seed_default_categories(&admin).unwrap();
    assert_eq!(first.inserted.len(), 6);
    assert!(first.skipped.is_empty());
    assert!(first.inserted.contains(&"milk-tea".to_string()));

    let second = catalog.seed_default_categories(&admin).unwrap();
    assert!(second.inserted.is_empty());
    assert_eq!(second.skipped.len(), 6);

    let names = catalog
        .list_categories()
        .unwrap()
        .into_iter()
        .map(|category| category.name)
        .collect::<Vec<_>>();
    assert_eq!(names.first().map(String::as_str), Some("Coffee"));
    assert_eq!(names.len(), 6);
}

#[test]
fn duplicate_category_slug_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();

    catalog.create_category(&admin, "Cold Brew", 1).unwrap();
    assert!(matches!(
        catalog.create_category(&admin, " cold   brew ", 2),
        Err(CatalogServiceError::DuplicateCategory(slug)) if slug == "cold-brew"
    ));
}

#[test]
fn customers_cannot_edit_the_catalog() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);

    assert!(matches!(
        catalog.create_product(&customer(), latte(None)),
        Err(CatalogServiceError::Access(_))
    ));
    assert!(matches!(
        catalog.seed_default_categories(&customer()),
        Err(CatalogServiceError::Access(_))
    ));
}

#[test]
fn product_round_trips_options_and_normalized_fields() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();
    let coffee = catalog.create_category(&admin, "Coffee", 0).unwrap();

    let mut draft = latte(Some(coffee.id));
    draft.name = "  Latte ".to_string();
    draft.description = Some("   ".to_string());
    draft.image_url = Some(" https://cdn.example.com/latte.png ".to_string());
    let saved = catalog.create_product(&admin, draft).unwrap();

    assert_eq!(saved.name, "Latte");
    assert_eq!(saved.description, None);
    assert_eq!(
        saved.image_url.as_deref(),
        Some("https://cdn.example.com/latte.png")
    );
    assert_eq!(saved.variants.len(), 2);
    assert_eq!(saved.topping("Pearl").map(|t| t.price_diff), Some(5_000));
}

#[test]
fn product_with_unknown_category_or_bad_image_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();

    assert!(matches!(
        catalog.create_product(&admin, latte(Some(Uuid::new_v4()))),
        Err(CatalogServiceError::CategoryNotFound(_))
    ));

    let mut bad_image = latte(None);
    bad_image.image_url = Some("file:///tmp/latte.png".to_string());
    assert!(matches!(
        catalog.create_product(&admin, bad_image),
        Err(CatalogServiceError::InvalidImageUrl(_))
    ));
}

#[test]
fn menu_hides_unavailable_products_from_customers() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();
    let latte = catalog.create_product(&admin, latte(None)).unwrap();
    let mocha = catalog
        .create_product(&admin, Product::new("Mocha", None, 50_000))
        .unwrap();

    catalog
        .set_product_availability(&admin, mocha.id, false)
        .unwrap();

    let public = catalog.list_menu(None, None).unwrap();
    assert_eq!(
        public.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![latte.id]
    );
    let as_customer = catalog.list_menu(Some(&customer()), None).unwrap();
    assert_eq!(as_customer.len(), 1);

    let back_office = catalog.list_menu(Some(&admin), None).unwrap();
    assert_eq!(back_office.len(), 2);
}

#[test]
fn built_lines_price_options_and_merge_in_cart() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();
    let latte = catalog.create_product(&admin, latte(None)).unwrap();

    let first = catalog
        .build_line(
            latte.id,
            Some("L"),
            &["Pearl".to_string(), "Cheese Foam".to_string()],
            1,
        )
        .unwrap();
    assert_eq!(first.unit_total(), 45_000 + 10_000 + 5_000 + 8_000);

    let reordered = catalog
        .build_line(
            latte.id,
            Some("L"),
            &["Cheese Foam".to_string(), "Pearl".to_string()],
            2,
        )
        .unwrap();
    let plain = catalog.build_line(latte.id, None, &[], 1).unwrap();

    let mut cart = Cart::new();
    cart.add(first);
    cart.add(reordered);
    cart.add(plain);

    assert_eq!(cart.lines().len(), 2);
    assert_eq!(cart.lines()[0].quantity, 3);
    assert_eq!(cart.item_count(), 4);
    assert_eq!(cart.total(), 68_000 * 3 + 45_000);
}

#[test]
fn build_line_rejects_unknown_options_and_unavailable_products() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();
    let latte = catalog.create_product(&admin, latte(None)).unwrap();

    assert!(matches!(
        catalog.build_line(latte.id, Some("XL"), &[], 1),
        Err(CatalogServiceError::Validation(ValidationError::UnknownOption { .. }))
    ));
    assert!(matches!(
        catalog.build_line(Uuid::new_v4(), None, &[], 1),
        Err(CatalogServiceError::ProductNotFound(_))
    ));

    catalog
        .set_product_availability(&admin, latte.id, false)
        .unwrap();
    assert!(matches!(
        catalog.build_line(latte.id, None, &[], 1),
        Err(CatalogServiceError::Validation(ValidationError::ProductUnavailable(_)))
    ));
}

#[test]
fn deleting_a_category_keeps_its_products() {
    let conn = open_db_in_memory().unwrap();
    let catalog = service(&conn);
    let admin = Actor::system();
    let tea = catalog.create_category(&admin, "Tea", 1).unwrap();
    let product = catalog
        .create_product(&admin, Product::new("Peach Tea", Some(tea.id), 40_000))
        .unwrap();

    catalog.delete_category(&admin, tea.id).unwrap();

    let reloaded = catalog.get_product(product.id).unwrap().unwrap();
    assert_eq!(reloaded.category_id, None);
    assert!(catalog.list_categories().unwrap().is_empty());
}
