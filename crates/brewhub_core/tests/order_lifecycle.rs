use brewhub_core::repo::catalog_repo::SqliteCatalogRepository;
use brewhub_core::repo::loyalty_repo::SqliteLoyaltyRepository;
use brewhub_core::repo::order_repo::{OrderListQuery, OrderRepository, SqliteOrderRepository};
use brewhub_core::repo::user_repo::SqliteUserRepository;
use brewhub_core::service::catalog_service::CatalogService;
use brewhub_core::service::loyalty_service::LoyaltyService;
use brewhub_core::service::order_service::{OrderService, OrderServiceError, PlaceOrderRequest};
use brewhub_core::service::user_service::UserService;
use brewhub_core::{
    open_db_in_memory, AccessError, Actor, Cart, LineItem, LoyaltyAccount, Order, OrderId,
    OrderStatus, PaymentMethod, PaymentStatus, Product, ProductOption, RepoError, RepoResult,
    Tier,
};
use rusqlite::Connection;
use std::cell::Cell;

type Orders<'conn> = OrderService<
    SqliteOrderRepository<'conn>,
    SqliteCatalogRepository<'conn>,
    SqliteLoyaltyRepository<'conn>,
>;

fn order_service(conn: &Connection) -> Orders<'_> {
    OrderService::new(
        SqliteOrderRepository::try_new(conn).unwrap(),
        SqliteCatalogRepository::try_new(conn).unwrap(),
        SqliteLoyaltyRepository::try_new(conn).unwrap(),
    )
}

fn register(conn: &Connection, phone: &str) -> Actor {
    let users = UserService::new(SqliteUserRepository::try_new(conn).unwrap());
    let user = users.register_customer("Guest", phone, "latte123").unwrap();
    Actor::from(&user)
}

fn add_latte(conn: &Connection) -> Product {
    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap());
    let mut product = Product::new("Latte", None, 45_000);
    product.variants = vec![ProductOption::new("L", 10_000)];
    catalog.create_product(&Actor::system(), product).unwrap()
}

fn cart_of(product: &Product, quantity: u32) -> Cart {
    Cart::from_lines([LineItem::from_product(product, None, &[], quantity).unwrap()])
}

fn request(cart: Cart) -> PlaceOrderRequest {
    PlaceOrderRequest {
        cart,
        discount: 0,
        payment_method: PaymentMethod::Cash,
        note: Some("  less ice ".to_string()),
    }
}

#[test]
fn placed_order_uses_current_catalog_prices() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);

    let mut stale = LineItem::from_product(&latte, Some("L"), &[], 2).unwrap();
    stale.unit_price = 1;
    let order = orders
        .place_order(&customer, request(Cart::from_lines([stale])))
        .unwrap();

    assert_eq!(order.user_id, Some(customer.user_id));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment.status, PaymentStatus::Pending);
    assert_eq!(order.subtotal, 110_000);
    assert_eq!(order.total, 110_000);
    assert_eq!(order.note.as_deref(), Some("less ice"));
    assert!(order.code.starts_with("CF"));
    assert_eq!(order.code.len(), "CF240315-7KQ2".len());
    assert_eq!(order.items[0].variant.as_ref().map(|v| v.name.as_str()), Some("L"));
}

#[test]
fn empty_cart_and_oversized_discount() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);

    assert!(matches!(
        orders.place_order(&customer, request(Cart::new())),
        Err(OrderServiceError::EmptyCart)
    ));

    let mut discounted = request(cart_of(&latte, 1));
    discounted.discount = 1_000_000;
    let order = orders.place_order(&customer, discounted).unwrap();
    assert_eq!(order.discount, 45_000);
    assert_eq!(order.total, 0);
}

#[test]
fn paid_order_completion_awards_loyalty_points() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&latte, 12)))
        .unwrap();
    for next in [
        OrderStatus::Paid,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ] {
        orders.update_status(&admin, order.id, next).unwrap();
    }

    let done = orders.get_order(&customer, order.id).unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.payment.status, PaymentStatus::Paid);
    assert_eq!(done.points_awarded, 540);
    assert!(done.completed_at.is_some());

    let loyalty = LoyaltyService::new(SqliteLoyaltyRepository::try_new(&conn).unwrap());
    let account = loyalty.get_account(customer.user_id).unwrap();
    assert_eq!(account.points, 540);
    assert_eq!(account.tier, Tier::Silver);
    assert_eq!(account.total_spent, 540_000);
    assert_eq!(account.order_count, 1);
}

#[test]
fn unpaid_counter_order_completes_without_points() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&latte, 1)))
        .unwrap();
    for next in [
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ] {
        orders.update_status(&admin, order.id, next).unwrap();
    }

    let done = orders.get_order(&admin, order.id).unwrap();
    assert_eq!(done.points_awarded, 0);
    let loyalty = LoyaltyService::new(SqliteLoyaltyRepository::try_new(&conn).unwrap());
    assert_eq!(loyalty.get_account(customer.user_id).unwrap().points, 0);
}

#[test]
fn invalid_transitions_leave_the_order_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&latte, 1)))
        .unwrap();
    assert!(matches!(
        orders.update_status(&admin, order.id, OrderStatus::Ready),
        Err(OrderServiceError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Ready
        })
    ));

    orders
        .update_status(&admin, order.id, OrderStatus::Cancelled)
        .unwrap();
    assert!(matches!(
        orders.update_status(&admin, order.id, OrderStatus::Paid),
        Err(OrderServiceError::InvalidTransition { .. })
    ));
    assert_eq!(
        orders.get_order(&admin, order.id).unwrap().status,
        OrderStatus::Cancelled
    );
}

#[test]
fn customer_may_cancel_only_own_pending_order() {
    let conn = open_db_in_memory().unwrap();
    let owner = register(&conn, "0901234567");
    let stranger = register(&conn, "0912345678");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);

    let first = orders
        .place_order(&owner, request(cart_of(&latte, 1)))
        .unwrap();
    assert!(matches!(
        orders.update_status(&stranger, first.id, OrderStatus::Cancelled),
        Err(OrderServiceError::Access(AccessError::NotOwner))
    ));
    assert!(matches!(
        orders.get_order(&stranger, first.id),
        Err(OrderServiceError::Access(AccessError::NotOwner))
    ));
    let cancelled = orders
        .update_status(&owner, first.id, OrderStatus::Cancelled)
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let second = orders
        .place_order(&owner, request(cart_of(&latte, 1)))
        .unwrap();
    orders
        .update_status(&Actor::system(), second.id, OrderStatus::Paid)
        .unwrap();
    assert!(matches!(
        orders.update_status(&owner, second.id, OrderStatus::Cancelled),
        Err(OrderServiceError::Access(AccessError::Forbidden { .. }))
    ));
}

#[test]
fn cancelling_a_paid_order_refunds_it() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&latte, 1)))
        .unwrap();
    orders.update_status(&admin, order.id, OrderStatus::Paid).unwrap();
    let cancelled = orders
        .update_status(&admin, order.id, OrderStatus::Cancelled)
        .unwrap();

    assert_eq!(cancelled.payment.status, PaymentStatus::Refunded);
    assert!(matches!(
        orders.set_payment_status(&admin, order.id, PaymentStatus::Paid),
        Err(OrderServiceError::PaymentLocked { .. })
    ));
}

#[test]
fn payment_status_updates_are_guarded() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&latte, 1)))
        .unwrap();
    assert!(matches!(
        orders.set_payment_status(&customer, order.id, PaymentStatus::Paid),
        Err(OrderServiceError::Access(_))
    ));
    assert!(matches!(
        orders.set_payment_status(&admin, order.id, PaymentStatus::Refunded),
        Err(OrderServiceError::PaymentLocked { .. })
    ));

    let paid = orders
        .set_payment_status(&admin, order.id, PaymentStatus::Paid)
        .unwrap();
    assert_eq!(paid.payment.status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatus::Pending);
    assert!(matches!(
        orders.set_payment_status(&admin, order.id, PaymentStatus::Pending),
        Err(OrderServiceError::PaymentLocked { .. })
    ));

    let settled = orders
        .place_order(&customer, request(cart_of(&latte, 1)))
        .unwrap();
    orders
        .update_status(&admin, settled.id, OrderStatus::Paid)
        .unwrap();
    for payment in [PaymentStatus::Pending, PaymentStatus::Failed] {
        assert!(matches!(
            orders.set_payment_status(&admin, settled.id, payment),
            Err(OrderServiceError::PaymentLocked {
                status: OrderStatus::Paid,
                ..
            })
        ));
    }
    let unchanged = orders.get_order(&admin, settled.id).unwrap();
    assert_eq!(unchanged.payment.status, PaymentStatus::Paid);

    let counter = orders
        .place_order(&customer, request(cart_of(&latte, 1)))
        .unwrap();
    orders
        .update_status(&admin, counter.id, OrderStatus::Preparing)
        .unwrap();
    orders
        .set_payment_status(&admin, counter.id, PaymentStatus::Paid)
        .unwrap();
    assert!(matches!(
        orders.set_payment_status(&admin, counter.id, PaymentStatus::Refunded),
        Err(OrderServiceError::PaymentLocked {
            status: OrderStatus::Preparing,
            ..
        })
    ));
}

/// Order repository whose next completion write fails before touching the
/// database.
struct FailingCompletion<'conn> {
    inner: SqliteOrderRepository<'conn>,
    fail_next: Cell<bool>,
}

impl OrderRepository for FailingCompletion<'_> {
    fn create_order(&self, order: &Order) -> RepoResult<OrderId> {
        self.inner.create_order(order)
    }

    fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        self.inner.get_order(id)
    }

    fn find_by_code(&self, code: &str) -> RepoResult<Option<Order>> {
        self.inner.find_by_code(code)
    }

    fn list_orders(&self, query: &OrderListQuery) -> RepoResult<Vec<Order>> {
        self.inner.list_orders(query)
    }

    fn save_lifecycle(
        &self,
        order: &Order,
        expected: OrderStatus,
        credited: Option<&LoyaltyAccount>,
    ) -> RepoResult<()> {
        if order.status == OrderStatus::Completed && self.fail_next.replace(false) {
            return Err(RepoError::Conflict("disk full".to_string()));
        }
        self.inner.save_lifecycle(order, expected, credited)
    }
}

#[test]
fn failed_completion_write_credits_points_once_on_retry() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let product = CatalogService::new(SqliteCatalogRepository::try_new(&conn).unwrap())
        .create_product(&Actor::system(), Product::new("Cold Brew", None, 100_000))
        .unwrap();
    let orders = OrderService::new(
        FailingCompletion {
            inner: SqliteOrderRepository::try_new(&conn).unwrap(),
            fail_next: Cell::new(true),
        },
        SqliteCatalogRepository::try_new(&conn).unwrap(),
        SqliteLoyaltyRepository::try_new(&conn).unwrap(),
    );
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&product, 1)))
        .unwrap();
    for next in [OrderStatus::Paid, OrderStatus::Preparing, OrderStatus::Ready] {
        orders.update_status(&admin, order.id, next).unwrap();
    }

    assert!(matches!(
        orders.update_status(&admin, order.id, OrderStatus::Completed),
        Err(OrderServiceError::Repo(RepoError::Conflict(_)))
    ));
    let loyalty = LoyaltyService::new(SqliteLoyaltyRepository::try_new(&conn).unwrap());
    assert_eq!(loyalty.get_account(customer.user_id).unwrap().points, 0);
    assert_eq!(
        orders.get_order(&admin, order.id).unwrap().status,
        OrderStatus::Ready
    );

    let done = orders
        .update_status(&admin, order.id, OrderStatus::Completed)
        .unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.points_awarded, 100);

    let account = loyalty.get_account(customer.user_id).unwrap();
    assert_eq!(account.points, 100);
    assert_eq!(account.order_count, 1);
}

#[test]
fn stale_lifecycle_write_is_rejected_without_crediting() {
    let conn = open_db_in_memory().unwrap();
    let customer = register(&conn, "0901234567");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);
    let admin = Actor::system();

    let order = orders
        .place_order(&customer, request(cart_of(&latte, 20)))
        .unwrap();
    for next in [OrderStatus::Paid, OrderStatus::Preparing, OrderStatus::Ready] {
        orders.update_status(&admin, order.id, next).unwrap();
    }
    let mut snapshot = orders.get_order(&admin, order.id).unwrap();
    orders
        .update_status(&admin, order.id, OrderStatus::Completed)
        .unwrap();

    assert!(snapshot.apply_transition(OrderStatus::Completed));
    let mut credit = LoyaltyAccount::new(customer.user_id);
    credit.accrue(snapshot.total);
    let repo = SqliteOrderRepository::try_new(&conn).unwrap();
    assert!(matches!(
        repo.save_lifecycle(&snapshot, OrderStatus::Ready, Some(&credit)),
        Err(RepoError::Conflict(_))
    ));

    let loyalty = LoyaltyService::new(SqliteLoyaltyRepository::try_new(&conn).unwrap());
    let account = loyalty.get_account(customer.user_id).unwrap();
    assert_eq!(account.points, 900);
    assert_eq!(account.order_count, 1);
}

#[test]
fn listing_is_scoped_for_customers_and_code_lookup_ignores_case() {
    let conn = open_db_in_memory().unwrap();
    let first = register(&conn, "0901234567");
    let second = register(&conn, "0912345678");
    let latte = add_latte(&conn);
    let orders = order_service(&conn);

    let mine = orders
        .place_order(&first, request(cart_of(&latte, 1)))
        .unwrap();
    orders
        .place_order(&second, request(cart_of(&latte, 2)))
        .unwrap();

    let listed = orders
        .list_orders(&first, &OrderListQuery::default())
        .unwrap();
    assert_eq!(listed.iter().map(|o| o.id).collect::<Vec<_>>(), vec![mine.id]);

    let all = orders
        .list_orders(&Actor::system(), &OrderListQuery::default())
        .unwrap();
    assert_eq!(all.len(), 2);

    let found = orders
        .find_by_code(&first, &format!(" {} ", mine.code.to_lowercase()))
        .unwrap();
    assert_eq!(found.id, mine.id);
}

#[test]
fn system_operator_places_anonymous_counter_orders() {
    let conn = open_db_in_memory().unwrap();
    let latte = add_latte(&conn);
    let orders = order_service(&conn);

    let order = orders
        .place_order(&Actor::system(), request(cart_of(&latte, 1)))
        .unwrap();
    assert_eq!(order.user_id, None);
}
