//! Error types for ergon-billing

use crate::plans::cents_to_dollars;
use crate::plans::UsageAction;
use serde::Serialize;
use thiserror::Error;

/// Billing error type
#[derive(Debug, Error)]
pub enum Error {
    /// No account exists for the user.
    ///
    /// Accounts are provisioned by the signup flow; the meter never
    /// fabricates one.
    #[error("no usage account for user: {0}")]
    UnknownUser(String),

    /// Non-free subscription is not active and has no balance to fall
    /// back on
    #[error("subscription inactive for {action} (status blocks plan usage)", action = .0.action)]
    SubscriptionInactive(RejectionDetails),

    /// Plan quota exhausted and balance below the pay-per-use rate
    #[error(
        "usage limit exceeded for {action}: {used}/{limit} used, balance ${balance:.2} < ${required:.2}",
        action = .0.action,
        used = .0.used,
        limit = .0.limit,
        balance = .0.current_balance,
        required = .0.required_balance
    )]
    UsageLimitExceeded(RejectionDetails),

    /// Database error
    #[error("database error: {0}")]
    Database(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a rejected caller needs to self-correct: wait for the
/// period reset, top up, or upgrade. Monetary fields are dollars.
#[derive(Debug, Clone, Serialize)]
pub struct RejectionDetails {
    /// Billable action that was denied
    pub action: String,
    /// Actions of this kind consumed in the current period
    pub used: u32,
    /// Plan allowance for this action
    pub limit: u32,
    /// Pay-per-use price for one more action (USD)
    pub price_per_unit: f64,
    /// Current prepaid balance (USD)
    pub current_balance: f64,
    /// Balance needed to admit this action pay-per-use (USD)
    pub required_balance: f64,
}

impl RejectionDetails {
    /// Build details from the live account fields the decision saw
    #[must_use]
    pub fn new(action: UsageAction, used: u32, limit: u32, balance_cents: i64) -> Self {
        let rate = action.rate_cents();
        Self {
            action: action.as_str().to_string(),
            used,
            limit,
            price_per_unit: cents_to_dollars(rate),
            current_balance: cents_to_dollars(balance_cents),
            required_balance: cents_to_dollars(rate),
        }
    }
}
