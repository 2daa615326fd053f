//! Back-office sales analytics.
//!
//! # Responsibility
//! - Load every order and user, filter them to a calendar-day range in the
//!   store's UTC offset and fold them into one report.
//!
//! # Invariants
//! - `revenue` is the sum of totals of orders whose payment is `paid`.
//! - `order_count` counts every order in range regardless of status.
//! - Daily buckets cover every day of the range, empty days included.
//! - Top products are ordered by quantity desc, revenue desc, name asc.

use crate::access::{AccessError, Actor, Permission};
use crate::model::catalog::ProductId;
use crate::model::order::{Order, OrderStatus};
use crate::model::user::{User, UserId};
use crate::model::Amount;
use crate::repo::common::RepoError;
use crate::repo::order_repo::{OrderListQuery, OrderRepository};
use crate::repo::user_repo::{UserListQuery, UserRepository};
use chrono::{DateTime, FixedOffset, NaiveDate};
use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const TOP_PRODUCTS_LIMIT: usize = 10;
const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug)]
pub enum AnalyticsServiceError {
    Access(AccessError),
    InvalidRange { start: NaiveDate, end: NaiveDate },
    Repo(RepoError),
}

impl Display for AnalyticsServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::InvalidRange { start, end } => {
                write!(f, "invalid report range {start}..={end}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AnalyticsServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::InvalidRange { .. } => None,
        }
    }
}

impl From<AccessError> for AnalyticsServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<RepoError> for AnalyticsServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Inclusive calendar-day range evaluated in `utc_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub utc_offset: FixedOffset,
}

impl AnalyticsQuery {
    pub fn new(start: NaiveDate, end: NaiveDate, utc_offset: FixedOffset) -> Self {
        Self {
            start,
            end,
            utc_offset,
        }
    }

    fn validate(&self) -> Result<(), AnalyticsServiceError> {
        let span = (self.end - self.start).num_days();
        if span < 0 || span >= MAX_RANGE_DAYS {
            return Err(AnalyticsServiceError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    fn day_of(&self, epoch_ms: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(epoch_ms)
            .map(|at| at.with_timezone(&self.utc_offset).date_naive())
    }

    fn contains(&self, epoch_ms: i64) -> bool {
        self.day_of(epoch_ms)
            .is_some_and(|day| day >= self.start && day <= self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u64,
    pub revenue: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub revenue: Amount,
    pub order_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub revenue: Amount,
    pub order_count: u64,
    pub paid_order_count: u64,
    pub completed_count: u64,
    pub cancelled_count: u64,
    /// Units sold across paid orders.
    pub items_sold: u64,
    /// `revenue / paid_order_count`, floored; zero without paid orders.
    pub average_order_value: Amount,
    pub new_customers: u64,
    pub returning_customers: u64,
    pub top_products: Vec<ProductSales>,
    pub daily: Vec<DailyBucket>,
    pub status_breakdown: BTreeMap<OrderStatus, u64>,
}

/// Folds `orders` and `users` into a report for `query`.
pub fn build_report(orders: &[Order], users: &[User], query: &AnalyticsQuery) -> AnalyticsReport {
    let in_range = orders
        .iter()
        .filter(|order| query.contains(order.created_at))
        .collect::<Vec<_>>();

    let mut revenue = 0;
    let mut paid_order_count = 0;
    let mut items_sold = 0;
    let mut status_breakdown = BTreeMap::new();
    let mut products: HashMap<ProductId, ProductSales> = HashMap::new();
    let mut daily: BTreeMap<NaiveDate, DailyBucket> = BTreeMap::new();

    let mut day = query.start;
    while day <= query.end {
        daily.insert(
            day,
            DailyBucket {
                date: day,
                revenue: 0,
                order_count: 0,
            },
        );
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    for order in &in_range {
        *status_breakdown.entry(order.status).or_insert(0) += 1;
        let bucket = query
            .day_of(order.created_at)
            .and_then(|day| daily.get_mut(&day));

        if let Some(bucket) = bucket {
            bucket.order_count += 1;
            if order.is_paid() {
                bucket.revenue += order.total;
            }
        }

        if !order.is_paid() {
            continue;
        }
        revenue += order.total;
        paid_order_count += 1;
        for item in &order.items {
            items_sold += u64::from(item.quantity);
            let entry = products
                .entry(item.product_id)
                .or_insert_with(|| ProductSales {
                    product_id: item.product_id,
                    name: item.product_name.clone(),
                    quantity: 0,
                    revenue: 0,
                });
            entry.quantity += u64::from(item.quantity);
            entry.revenue += item.line_total();
        }
    }

    let mut top_products = products.into_values().collect::<Vec<_>>();
    top_products.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    top_products.truncate(TOP_PRODUCTS_LIMIT);

    let (new_customers, returning_customers) = split_customers(&in_range, users, query);

    AnalyticsReport {
        start: query.start,
        end: query.end,
        revenue,
        order_count: in_range.len() as u64,
        paid_order_count,
        completed_count: status_breakdown
            .get(&OrderStatus::Completed)
            .copied()
            .unwrap_or(0),
        cancelled_count: status_breakdown
            .get(&OrderStatus::Cancelled)
            .copied()
            .unwrap_or(0),
        items_sold,
        average_order_value: if paid_order_count == 0 {
            0
        } else {
            revenue / paid_order_count as Amount
        },
        new_customers,
        returning_customers,
        top_products,
        daily: daily.into_values().collect(),
        status_breakdown,
    }
}

/// Customers ordering in range are new when their account was created in
/// range too. Unknown accounts count as returning.
fn split_customers(orders: &[&Order], users: &[User], query: &AnalyticsQuery) -> (u64, u64) {
    let created_at: HashMap<UserId, i64> = users
        .iter()
        .map(|user| (user.id, user.created_at))
        .collect();
    let customers = orders
        .iter()
        .filter_map(|order| order.user_id)
        .collect::<HashSet<_>>();

    let mut new_customers = 0;
    let mut returning_customers = 0;
    for user_id in customers {
        match created_at.get(&user_id) {
            Some(created) if query.contains(*created) => new_customers += 1,
            _ => returning_customers += 1,
        }
    }
    (new_customers, returning_customers)
}

pub struct AnalyticsService<O: OrderRepository, U: UserRepository> {
    orders: O,
    users: U,
}

impl<O: OrderRepository, U: UserRepository> AnalyticsService<O, U> {
    pub fn new(orders: O, users: U) -> Self {
        Self { orders, users }
    }

    /// Builds the sales report. Admin only.
    pub fn report(
        &self,
        actor: &Actor,
        query: &AnalyticsQuery,
    ) -> Result<AnalyticsReport, AnalyticsServiceError> {
        actor.ensure(Permission::ViewAnalytics)?;
        query.validate()?;
        let started_at = Instant::now();

        let orders = self.orders.list_orders(&OrderListQuery::default())?;
        let users = self.users.list_users(&UserListQuery {
            include_archived: true,
            ..UserListQuery::default()
        })?;
        let report = build_report(&orders, &users, query);

        info!(
            "event=analytics_report module=analytics status=ok start={} end={} orders={} duration_ms={}",
            query.start,
            query.end,
            report.order_count,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}
