use brewhub_core::model::pos::{PosOrderStatus, PrintStatus, TableStatus};
use brewhub_core::repo::catalog_repo::SqliteCatalogRepository;
use brewhub_core::repo::pos_repo::SqlitePosRepository;
use brewhub_core::service::catalog_service::CatalogService;
use brewhub_core::service::pos_service::{PosItemRequest, PosService, PosServiceError};
use brewhub_core::{
    open_db_in_memory, Actor, LineKey, PaymentMethod, Product, ProductOption, UserRole,
};
use chrono::{FixedOffset, Utc};
use rusqlite::Connection;
use uuid::Uuid;

type Pos<'conn> = PosService<SqlitePosRepository<'conn>, SqliteCatalogRepository<'conn>>;

fn ict() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

fn pos(conn: &Connection) -> Pos<'_> {
    PosService::new(
        SqlitePosRepository::try_new(conn).unwrap(),
        SqliteCatalogRepository::try_new(conn).unwrap(),
        ict(),
    )
}

fn add_product(conn: &Connection, name: &str, price: i64) -> Product {
    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap());
    let mut product = Product::new(name, None, price);
    product.toppings = vec![ProductOption::new("Pearl", 5_000)];
    catalog.create_product(&Actor::system(), product).unwrap()
}

fn item(product: &Product, toppings: &[&str], quantity: u32) -> PosItemRequest {
    PosItemRequest {
        product_id: product.id,
        variant: None,
        toppings: toppings.iter().map(|name| name.to_string()).collect(),
        quantity,
    }
}

fn today_code_prefix() -> String {
    format!("HD{}-", Utc::now().with_timezone(&ict()).format("%Y%m%d"))
}

#[test]
fn opening_a_table_tab_occupies_the_table_once() {
    let conn = open_db_in_memory().unwrap();
    let pos = pos(&conn);
    let staff = Actor::system();
    let table = pos.create_table(&staff, " T1 ", 4).unwrap();
    assert_eq!(table.name, "T1");

    let first = pos.open_order(&staff, Some(table.id)).unwrap();
    let again = pos.open_order(&staff, Some(table.id)).unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(first.staff_id, None);

    let tables = pos.list_tables(&staff).unwrap();
    assert_eq!(tables[0].status, TableStatus::Occupied);
    assert_eq!(pos.list_open_orders(&staff).unwrap().len(), 1);

    assert!(matches!(
        pos.open_order(&staff, Some(Uuid::new_v4())),
        Err(PosServiceError::TableNotFound(_))
    ));
}

#[test]
fn items_merge_and_quantities_can_be_edited() {
    let conn = open_db_in_memory().unwrap();
    let latte = add_product(&conn, "Latte", 45_000);
    let pos = pos(&conn);
    let staff = Actor::system();
    let tab = pos.open_order(&staff, None).unwrap();

    pos.add_item(&staff, tab.id, &item(&latte, &["Pearl"], 1)).unwrap();
    pos.add_item(&staff, tab.id, &item(&latte, &["Pearl"], 2)).unwrap();
    let tab = pos.add_item(&staff, tab.id, &item(&latte, &[], 1)).unwrap();
    assert_eq!(tab.items.len(), 2);
    assert_eq!(tab.items[0].quantity, 3);

    let topped = tab.items[0].key();
    let tab = pos.set_item_quantity(&staff, tab.id, &topped, 1).unwrap();
    assert_eq!(tab.items[0].quantity, 1);

    let plain = LineKey {
        product_id: latte.id,
        variant: None,
        toppings: Vec::new(),
    };
    let tab = pos.set_item_quantity(&staff, tab.id, &plain, 0).unwrap();
    assert_eq!(tab.items.len(), 1);
    assert!(matches!(
        pos.set_item_quantity(&staff, tab.id, &plain, 2),
        Err(PosServiceError::LineNotFound)
    ));

    let tab = pos
        .set_note(&staff, tab.id, Some("  table by the window ".to_string()))
        .unwrap();
    assert_eq!(tab.note.as_deref(), Some("table by the window"));
}

#[test]
fn checkout_issues_sequential_daily_invoices_and_frees_the_table() {
    let conn = open_db_in_memory().unwrap();
    let latte = add_product(&conn, "Latte", 45_000);
    let pos = pos(&conn);
    let staff = Actor::system();
    let table = pos.create_table(&staff, "T1", 2).unwrap();

    let first_tab = pos.open_order(&staff, Some(table.id)).unwrap();
    pos.add_item(&staff, first_tab.id, &item(&latte, &["Pearl"], 2))
        .unwrap();
    let first = pos
        .checkout(&staff, first_tab.id, 10_000, PaymentMethod::Cash)
        .unwrap();

    assert_eq!(first.code, format!("{}0001", today_code_prefix()));
    assert_eq!(first.subtotal, 100_000);
    assert_eq!(first.discount, 10_000);
    assert_eq!(first.total, 90_000);
    assert_eq!(first.table_id, Some(table.id));
    assert_eq!(first.print_status, PrintStatus::NotPrinted);

    assert_eq!(
        pos.get_order(&staff, first_tab.id).unwrap().status,
        PosOrderStatus::Invoiced
    );
    assert_eq!(pos.list_tables(&staff).unwrap()[0].status, TableStatus::Available);

    let second_tab = pos.open_order(&staff, Some(table.id)).unwrap();
    assert_ne!(second_tab.id, first_tab.id);
    pos.add_item(&staff, second_tab.id, &item(&latte, &[], 1))
        .unwrap();
    let second = pos
        .checkout(&staff, second_tab.id, 0, PaymentMethod::BankTransfer)
        .unwrap();
    assert_eq!(second.code, format!("{}0002", today_code_prefix()));

    let today = Utc::now().with_timezone(&ict()).date_naive();
    let listed = pos.list_invoices(&staff, today, today).unwrap();
    assert_eq!(
        listed.iter().map(|inv| inv.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
}

#[test]
fn closed_and_empty_tabs_cannot_be_checked_out() {
    let conn = open_db_in_memory().unwrap();
    let latte = add_product(&conn, "Latte", 45_000);
    let pos = pos(&conn);
    let staff = Actor::system();

    let empty = pos.open_order(&staff, None).unwrap();
    assert!(matches!(
        pos.checkout(&staff, empty.id, 0, PaymentMethod::Cash),
        Err(PosServiceError::EmptyOrder(_))
    ));

    let tab = pos.open_order(&staff, None).unwrap();
    pos.add_item(&staff, tab.id, &item(&latte, &[], 1)).unwrap();
    pos.checkout(&staff, tab.id, 0, PaymentMethod::Card).unwrap();
    assert!(matches!(
        pos.checkout(&staff, tab.id, 0, PaymentMethod::Card),
        Err(PosServiceError::OrderClosed(_))
    ));
    assert!(matches!(
        pos.add_item(&staff, tab.id, &item(&latte, &[], 1)),
        Err(PosServiceError::OrderClosed(_))
    ));
}

#[test]
fn printing_counts_every_copy() {
    let conn = open_db_in_memory().unwrap();
    let latte = add_product(&conn, "Latte", 45_000);
    let pos = pos(&conn);
    let staff = Actor::system();
    let tab = pos.open_order(&staff, None).unwrap();
    pos.add_item(&staff, tab.id, &item(&latte, &[], 1)).unwrap();
    let invoice = pos.checkout(&staff, tab.id, 0, PaymentMethod::Cash).unwrap();

    pos.mark_printed(&staff, invoice.id).unwrap();
    let reprinted = pos.mark_printed(&staff, invoice.id).unwrap();
    assert_eq!(reprinted.print_status, PrintStatus::Printed);
    assert_eq!(reprinted.print_count, 2);
    assert!(reprinted.printed_at.is_some());

    assert!(matches!(
        pos.mark_printed(&staff, Uuid::new_v4()),
        Err(PosServiceError::InvoiceNotFound(_))
    ));
}

#[test]
fn tables_with_open_tabs_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let pos = pos(&conn);
    let staff = Actor::system();
    let table = pos.create_table(&staff, "Patio", 6).unwrap();
    let tab = pos.open_order(&staff, Some(table.id)).unwrap();

    assert!(matches!(
        pos.delete_table(&staff, table.id),
        Err(PosServiceError::TableBusy(_))
    ));

    let cancelled = pos.cancel_order(&staff, tab.id).unwrap();
    assert_eq!(cancelled.status, PosOrderStatus::Cancelled);
    pos.delete_table(&staff, table.id).unwrap();
    assert!(pos.list_tables(&staff).unwrap().is_empty());
    assert!(matches!(
        pos.delete_table(&staff, table.id),
        Err(PosServiceError::TableNotFound(_))
    ));
}

#[test]
fn table_names_are_unique_and_pos_is_staff_only() {
    let conn = open_db_in_memory().unwrap();
    let pos = pos(&conn);
    let staff = Actor::system();
    pos.create_table(&staff, "T1", 2).unwrap();

    assert!(matches!(
        pos.create_table(&staff, "T1", 4),
        Err(PosServiceError::TableNameTaken(name)) if name == "T1"
    ));

    let customer = Actor::new(Uuid::new_v4(), UserRole::Customer);
    assert!(matches!(
        pos.open_order(&customer, None),
        Err(PosServiceError::Access(_))
    ));
}
