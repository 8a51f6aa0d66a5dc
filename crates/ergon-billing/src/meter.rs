//! UsageMeter - billing admission control
//!
//! Decision order for one billable action: load the account, reject
//! lapsed paid subscriptions with no balance, consume plan quota,
//! fall back to the prepaid balance, reject. Both mutating steps are
//! conditional store updates, so the meter itself holds no locks and
//! tolerates arbitrary interleaving.

use crate::error::{Error, RejectionDetails, Result};
use crate::plans::{cents_to_dollars, PlanTier, UsageAction};
use crate::store::AccountStore;
use crate::UsageAccount;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an admitted action was funded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionSource {
    /// Covered by the plan's monthly allowance
    Plan,
    /// Charged against the prepaid balance
    TopUp,
}

impl AdmissionSource {
    /// String form used in logs and response metadata
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::TopUp => "topup",
        }
    }
}

/// A granted admission for one billable action
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Admission {
    /// Funding source
    pub source: AdmissionSource,
    /// Amount charged in cents (zero for plan admissions)
    pub charged_cents: i64,
}

impl Admission {
    /// Charged amount in dollars, for API edges
    #[must_use]
    pub fn charged_dollars(&self) -> f64 {
        cents_to_dollars(self.charged_cents)
    }
}

/// Billing admission gate over an [`AccountStore`]
pub struct UsageMeter {
    store: Arc<dyn AccountStore>,
}

impl UsageMeter {
    /// Create a meter over the given store
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Admit or reject one billable action, charging as a side effect.
    ///
    /// Runs before any LLM call so rejected requests never incur
    /// provider cost.
    pub async fn check_and_charge(&self, user_id: &str, action: UsageAction) -> Result<Admission> {
        let account = self.store.get(user_id).await?;

        let limit = account.tier.limits().for_action(action);
        let used = account.used(action);
        let rate = action.rate_cents();

        // Lapsed paid subscriptions may only proceed on remaining balance
        if account.tier != PlanTier::Free
            && !account.status.is_usable()
            && account.balance_cents <= 0
        {
            warn!(
                user_id,
                status = account.status.as_str(),
                action = action.as_str(),
                "admission denied: subscription inactive"
            );
            return Err(Error::SubscriptionInactive(RejectionDetails::new(
                action,
                used,
                limit,
                account.balance_cents,
            )));
        }

        // Plan quota first. The increment re-checks the limit in the
        // store, so two interleaved requests cannot both take the last
        // included unit.
        if used < limit
            && self
                .store
                .try_consume_plan_quota(user_id, action, limit)
                .await?
        {
            debug!(
                user_id,
                action = action.as_str(),
                limit,
                "admitted from plan quota"
            );
            return Ok(Admission {
                source: AdmissionSource::Plan,
                charged_cents: 0,
            });
        }

        // Pay-per-use fallback. The balance check and its decrement are
        // one conditional statement; splitting them across round trips
        // would let two concurrent requests both pass the check and
        // overdraw.
        if account.balance_cents >= rate
            && self.store.try_charge_balance(user_id, action, rate).await?
        {
            info!(
                user_id,
                action = action.as_str(),
                charged_cents = rate,
                "admitted pay-per-use"
            );
            return Ok(Admission {
                source: AdmissionSource::TopUp,
                charged_cents: rate,
            });
        }

        warn!(
            user_id,
            action = action.as_str(),
            used,
            limit,
            balance_cents = account.balance_cents,
            "admission denied: usage limit exceeded"
        );
        Err(Error::UsageLimitExceeded(RejectionDetails::new(
            action,
            used,
            limit,
            account.balance_cents,
        )))
    }

    /// The caller's live account, for the usage endpoint
    pub async fn account(&self, user_id: &str) -> Result<UsageAccount> {
        self.store.get(user_id).await
    }

    /// Zero the usage counters on billing-period rollover
    pub async fn reset_counters(&self, user_id: &str) -> Result<()> {
        self.store.reset_counters(user_id).await
    }
}
