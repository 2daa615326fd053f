//! Loyalty points and tiers.
//!
//! # Invariants
//! - One point per [`CURRENCY_UNITS_PER_POINT`] spent, floored.
//! - Tier is a pure function of cumulative points and is persisted after
//!   every accrual.

use super::user::UserId;
use super::{now_ms, Amount};
use serde::{Deserialize, Serialize};

pub const CURRENCY_UNITS_PER_POINT: Amount = 1_000;
pub const SILVER_THRESHOLD: i64 = 500;
pub const GOLD_THRESHOLD: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn for_points(points: i64) -> Self {
        if points >= GOLD_THRESHOLD {
            Self::Gold
        } else if points >= SILVER_THRESHOLD {
            Self::Silver
        } else {
            Self::Bronze
        }
    }

    /// Points needed to enter the next tier, `None` at the top tier.
    pub fn next_threshold(self) -> Option<i64> {
        match self {
            Self::Bronze => Some(SILVER_THRESHOLD),
            Self::Silver => Some(GOLD_THRESHOLD),
            Self::Gold => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bronze" => Some(Self::Bronze),
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            _ => None,
        }
    }
}

/// Points earned for spending `amount`.
pub fn points_for_amount(amount: Amount) -> i64 {
    if amount <= 0 {
        return 0;
    }
    amount / CURRENCY_UNITS_PER_POINT
}

/// Per-user loyalty ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub user_id: UserId,
    pub points: i64,
    pub tier: Tier,
    pub total_spent: Amount,
    pub order_count: i64,
    pub updated_at: i64,
}

impl LoyaltyAccount {
    /// Fresh bronze account with no history.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            points: 0,
            tier: Tier::Bronze,
            total_spent: 0,
            order_count: 0,
            updated_at: now_ms(),
        }
    }

    /// Records one paid order and returns points earned.
    pub fn accrue(&mut self, amount: Amount) -> i64 {
        let earned = points_for_amount(amount);
        self.points += earned;
        self.total_spent += amount.max(0);
        self.order_count += 1;
        self.tier = Tier::for_points(self.points);
        self.updated_at = now_ms();
        earned
    }

    /// Points still missing for the next tier.
    pub fn points_to_next_tier(&self) -> Option<i64> {
        self.tier
            .next_threshold()
            .map(|threshold| (threshold - self.points).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::{points_for_amount, LoyaltyAccount, Tier};
    use uuid::Uuid;

    #[test]
    fn tier_thresholds() {
        assert_eq!(Tier::for_points(0), Tier::Bronze);
        assert_eq!(Tier::for_points(499), Tier::Bronze);
        assert_eq!(Tier::for_points(500), Tier::Silver);
        assert_eq!(Tier::for_points(999), Tier::Silver);
        assert_eq!(Tier::for_points(1_000), Tier::Gold);
        assert_eq!(Tier::for_points(25_000), Tier::Gold);
    }

    #[test]
    fn accrual_is_floored_per_thousand() {
        assert_eq!(points_for_amount(999), 0);
        assert_eq!(points_for_amount(1_000), 1);
        assert_eq!(points_for_amount(45_900), 45);
        assert_eq!(points_for_amount(-10_000), 0);
    }

    #[test]
    fn accrue_updates_tier_and_counters() {
        let mut account = LoyaltyAccount::new(Uuid::new_v4());
        assert_eq!(account.accrue(499_999), 499);
        assert_eq!(account.tier, Tier::Bronze);
        assert_eq!(account.points_to_next_tier(), Some(1));

        assert_eq!(account.accrue(1_500), 1);
        assert_eq!(account.tier, Tier::Silver);
        assert_eq!(account.order_count, 2);
        assert_eq!(account.total_spent, 501_499);
    }

    #[test]
    fn gold_has_no_next_tier() {
        let mut account = LoyaltyAccount::new(Uuid::new_v4());
        account.accrue(1_000_000);
        assert_eq!(account.tier, Tier::Gold);
        assert_eq!(account.points_to_next_tier(), None);
    }
}
