//! Loyalty ledger use-cases.
//!
//! # Invariants
//! - Missing accounts read as fresh bronze accounts and are created on first
//!   accrual.
//! - Tier is persisted together with points after every accrual.

use crate::access::{AccessError, Actor, Permission};
use crate::model::loyalty::{LoyaltyAccount, Tier};
use crate::model::user::UserId;
use crate::model::Amount;
use crate::repo::common::{RepoError, RepoResult};
use crate::repo::loyalty_repo::LoyaltyRepository;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum LoyaltyServiceError {
    Access(AccessError),
    Repo(RepoError),
}

impl Display for LoyaltyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoyaltyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<AccessError> for LoyaltyServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<RepoError> for LoyaltyServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Result of one accrual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accrual {
    pub earned: i64,
    pub account: LoyaltyAccount,
    pub previous_tier: Tier,
}

pub struct LoyaltyService<R: LoyaltyRepository> {
    repo: R,
}

impl<R: LoyaltyRepository> LoyaltyService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn get_account(&self, user_id: UserId) -> RepoResult<LoyaltyAccount> {
        Ok(self
            .repo
            .get_account(user_id)?
            .unwrap_or_else(|| LoyaltyAccount::new(user_id)))
    }

    /// Credits `amount` of paid spend to `user_id`.
    pub fn accrue(&self, user_id: UserId, amount: Amount) -> RepoResult<Accrual> {
        let accrual = plan_accrual(&self.repo, user_id, amount)?;
        self.repo.save_account(&accrual.account)?;
        log_accrual(&accrual);
        Ok(accrual)
    }

    /// Top accounts by points for the back office.
    pub fn leaderboard(
        &self,
        actor: &Actor,
        limit: u32,
    ) -> Result<Vec<LoyaltyAccount>, LoyaltyServiceError> {
        actor.ensure(Permission::ManageUsers)?;
        Ok(self.repo.list_accounts(Some(limit))?)
    }
}

/// Computes the account after crediting `amount`, without saving it.
pub(crate) fn plan_accrual<R: LoyaltyRepository + ?Sized>(
    repo: &R,
    user_id: UserId,
    amount: Amount,
) -> RepoResult<Accrual> {
    let mut account = repo
        .get_account(user_id)?
        .unwrap_or_else(|| LoyaltyAccount::new(user_id));
    let previous_tier = account.tier;
    let earned = account.accrue(amount);
    Ok(Accrual {
        earned,
        account,
        previous_tier,
    })
}

/// Logs a persisted accrual.
pub(crate) fn log_accrual(accrual: &Accrual) {
    let account = &accrual.account;
    info!(
        "event=loyalty_accrue module=loyalty status=ok user_id={} earned={} points={} tier={}",
        account.user_id,
        accrual.earned,
        account.points,
        account.tier.as_str()
    );
    if account.tier != accrual.previous_tier {
        info!(
            "event=loyalty_tier_change module=loyalty status=ok user_id={} from={} to={}",
            account.user_id,
            accrual.previous_tier.as_str(),
            account.tier.as_str()
        );
    }
}
