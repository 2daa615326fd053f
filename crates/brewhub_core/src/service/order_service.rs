//! Order placement and lifecycle use-cases.
//!
//! # Responsibility
//! - Re-price carts against the live catalog and persist orders.
//! - Drive the status machine with role checks.
//! - Award loyalty points when a paid order completes.
//!
//! # Invariants
//! - Customers see and cancel only their own orders; cancel only while
//!   `pending`.
//! - Points are awarded at most once, on the `ready -> completed` move, and
//!   only when payment is `paid`. The credit and the status change commit
//!   together, and only if no one else moved the order first.
//! - Payment status is frozen once an order is terminal or paid; refunds
//!   happen only by cancelling a paid order.

use crate::access::{AccessError, Actor, Permission};
use crate::model::cart::{Cart, LineItem};
use crate::model::order::{
    generate_order_code, Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::model::{now_ms, Amount, ValidationError};
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::common::RepoError;
use crate::repo::loyalty_repo::LoyaltyRepository;
use crate::repo::order_repo::{OrderListQuery, OrderRepository};
use crate::service::loyalty_service::{log_accrual, plan_accrual};
use chrono::Utc;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_CODE_ATTEMPTS: usize = 5;
const MAX_NOTE_CHARS: usize = 500;

#[derive(Debug)]
pub enum OrderServiceError {
    Validation(ValidationError),
    Access(AccessError),
    EmptyCart,
    ProductNotFound(String),
    OrderNotFound(String),
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },
    /// Payment status cannot change in the order's current state.
    PaymentLocked {
        status: OrderStatus,
        payment: PaymentStatus,
    },
    Repo(RepoError),
}

impl Display for OrderServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::EmptyCart => write!(f, "cart is empty"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::OrderNotFound(id) => write!(f, "order not found: {id}"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "order cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::PaymentLocked { status, payment } => write!(
                f,
                "payment cannot become `{}` while order is `{}`",
                payment.as_str(),
                status.as_str()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrderServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OrderServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::OrderNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for OrderServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessError> for OrderServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

/// Checkout input built from a client cart.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub cart: Cart,
    pub discount: Amount,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

/// Order service over order, catalog and loyalty repositories.
pub struct OrderService<O, C, L>
where
    O: OrderRepository,
    C: CatalogRepository,
    L: LoyaltyRepository,
{
    orders: O,
    catalog: C,
    loyalty: L,
}

impl<O, C, L> OrderService<O, C, L>
where
    O: OrderRepository,
    C: CatalogRepository,
    L: LoyaltyRepository,
{
    pub fn new(orders: O, catalog: C, loyalty: L) -> Self {
        Self {
            orders,
            catalog,
            loyalty,
        }
    }

    /// Places a pending order for `actor`.
    ///
    /// Cart lines are rebuilt from the current catalog so stale client prices
    /// and switched-off products never reach an order.
    pub fn place_order(
        &self,
        actor: &Actor,
        request: PlaceOrderRequest,
    ) -> Result<Order, OrderServiceError> {
        actor.ensure(Permission::PlaceOrder)?;
        if request.cart.is_empty() {
            return Err(OrderServiceError::EmptyCart);
        }

        let items = self.reprice(request.cart.lines())?;
        let owner = (!actor.user_id.is_nil()).then_some(actor.user_id);
        let mut order = Order::new(owner, items, request.discount, request.payment_method);
        order.note = normalize_note(request.note);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.orders.create_order(&order) {
                Ok(_) => break,
                Err(RepoError::Conflict(_)) if attempt < MAX_CODE_ATTEMPTS => {
                    warn!(
                        "event=order_place module=order status=retry attempt={attempt} error_code=code_collision"
                    );
                    order.code = generate_order_code(Utc::now());
                }
                Err(err) => {
                    warn!("event=order_place module=order status=error error={err}");
                    return Err(err.into());
                }
            }
        }

        info!(
            "event=order_place module=order status=ok order_id={} items={} total={} method={}",
            order.id,
            order.item_count(),
            order.total,
            order.payment.method.as_str()
        );
        self.require_order(order.id)
    }

    pub fn get_order(&self, actor: &Actor, id: OrderId) -> Result<Order, OrderServiceError> {
        let order = self.require_order(id)?;
        ensure_can_read(actor, &order)?;
        Ok(order)
    }

    /// Looks up an order by its printed code, e.g. for counter pickup.
    pub fn find_by_code(&self, actor: &Actor, code: &str) -> Result<Order, OrderServiceError> {
        let order = self
            .orders
            .find_by_code(code)?
            .ok_or_else(|| OrderServiceError::OrderNotFound(code.trim().to_string()))?;
        ensure_can_read(actor, &order)?;
        Ok(order)
    }

    /// Lists orders; customers are always scoped to their own history.
    pub fn list_orders(
        &self,
        actor: &Actor,
        query: &OrderListQuery,
    ) -> Result<Vec<Order>, OrderServiceError> {
        let mut query = query.clone();
        if !actor.allows(Permission::ManageOrders) {
            query.user_id = Some(actor.user_id);
        }
        Ok(self.orders.list_orders(&query)?)
    }

    /// Moves an order to `next`, applying payment and loyalty side effects.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        let mut order = self.require_order(id)?;
        ensure_can_transition(actor, &order, next)?;

        let from = order.status;
        if !order.apply_transition(next) {
            warn!(
                "event=order_transition module=order status=error order_id={} from={} to={} error_code=invalid_transition",
                order.id,
                from.as_str(),
                next.as_str()
            );
            return Err(OrderServiceError::InvalidTransition { from, to: next });
        }

        let accrual = match order.user_id {
            Some(user_id) if next == OrderStatus::Completed && order.is_paid() => {
                let accrual = plan_accrual(&self.loyalty, user_id, order.total)?;
                order.points_awarded = accrual.earned;
                Some(accrual)
            }
            _ => None,
        };

        self.orders
            .save_lifecycle(&order, from, accrual.as_ref().map(|accrual| &accrual.account))?;
        if let Some(accrual) = &accrual {
            log_accrual(accrual);
        }
        info!(
            "event=order_transition module=order status=ok order_id={} from={} to={} payment={} points={}",
            order.id,
            from.as_str(),
            next.as_str(),
            order.payment.status.as_str(),
            order.points_awarded
        );
        self.require_order(id)
    }

    /// Records a payment outcome reported by the counter or a bank transfer.
    pub fn set_payment_status(
        &self,
        actor: &Actor,
        id: OrderId,
        payment: PaymentStatus,
    ) -> Result<Order, OrderServiceError> {
        actor.ensure(Permission::ManageOrders)?;
        let mut order = self.require_order(id)?;

        let allowed = !order.status.is_terminal()
            && payment != PaymentStatus::Refunded
            && (!order.is_paid() || payment == PaymentStatus::Paid);
        if !allowed {
            return Err(OrderServiceError::PaymentLocked {
                status: order.status,
                payment,
            });
        }

        let previous = order.payment.status;
        order.payment.status = payment;
        order.updated_at = now_ms();
        self.orders.save_lifecycle(&order, order.status, None)?;
        info!(
            "event=order_payment module=order status=ok order_id={} from={} to={}",
            order.id,
            previous.as_str(),
            payment.as_str()
        );
        self.require_order(id)
    }

    fn reprice(&self, lines: &[LineItem]) -> Result<Vec<LineItem>, OrderServiceError> {
        let mut cart = Cart::new();
        for line in lines {
            let product = self
                .catalog
                .get_product(line.product_id)?
                .ok_or_else(|| OrderServiceError::ProductNotFound(line.product_id.to_string()))?;
            let toppings = line
                .toppings
                .iter()
                .map(|option| option.name.clone())
                .collect::<Vec<_>>();
            cart.add(LineItem::from_product(
                &product,
                line.variant.as_ref().map(|option| option.name.as_str()),
                &toppings,
                line.quantity,
            )?);
        }
        if cart.is_empty() {
            return Err(OrderServiceError::EmptyCart);
        }
        Ok(cart.into_lines())
    }

    fn require_order(&self, id: OrderId) -> Result<Order, OrderServiceError> {
        self.orders
            .get_order(id)?
            .ok_or_else(|| OrderServiceError::OrderNotFound(id.to_string()))
    }
}

fn ensure_can_read(actor: &Actor, order: &Order) -> Result<(), AccessError> {
    if actor.allows(Permission::ManageOrders) || order.user_id == Some(actor.user_id) {
        Ok(())
    } else {
        Err(AccessError::NotOwner)
    }
}

fn ensure_can_transition(
    actor: &Actor,
    order: &Order,
    next: OrderStatus,
) -> Result<(), AccessError> {
    if actor.allows(Permission::ManageOrders) {
        return Ok(());
    }
    if order.user_id != Some(actor.user_id) {
        return Err(AccessError::NotOwner);
    }
    if next == OrderStatus::Cancelled && order.status == OrderStatus::Pending {
        return Ok(());
    }
    Err(AccessError::Forbidden {
        role: actor.role,
        permission: Permission::ManageOrders,
    })
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|text| text.trim().chars().take(MAX_NOTE_CHARS).collect::<String>())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ensure_can_transition, normalize_note};
    use crate::access::{AccessError, Actor};
    use crate::model::cart::LineItem;
    use crate::model::catalog::Product;
    use crate::model::order::{Order, OrderStatus, PaymentMethod};
    use crate::model::user::UserRole;
    use uuid::Uuid;

    fn order_for(user_id: Uuid) -> Order {
        let product = Product::new("Bac xiu", None, 29_000);
        let items = vec![LineItem::from_product(&product, None, &[], 1).unwrap()];
        Order::new(Some(user_id), items, 0, PaymentMethod::Cash)
    }

    #[test]
    fn owner_may_cancel_pending_order_only() {
        let owner = Actor::new(Uuid::new_v4(), UserRole::Customer);
        let mut order = order_for(owner.user_id);
        assert!(ensure_can_transition(&owner, &order, OrderStatus::Cancelled).is_ok());
        assert!(ensure_can_transition(&owner, &order, OrderStatus::Paid).is_err());

        order.status = OrderStatus::Paid;
        assert!(ensure_can_transition(&owner, &order, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn strangers_cannot_touch_orders() {
        let order = order_for(Uuid::new_v4());
        let stranger = Actor::new(Uuid::new_v4(), UserRole::Customer);
        assert_eq!(
            ensure_can_transition(&stranger, &order, OrderStatus::Cancelled),
            Err(AccessError::NotOwner)
        );
        assert!(ensure_can_transition(&Actor::system(), &order, OrderStatus::Paid).is_ok());
    }

    #[test]
    fn blank_notes_are_dropped() {
        assert_eq!(normalize_note(Some("   ".to_string())), None);
        assert_eq!(
            normalize_note(Some(" less ice ".to_string())).as_deref(),
            Some("less ice")
        );
    }
}
