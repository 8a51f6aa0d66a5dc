//! Usage account snapshot

use crate::plans::{cents_to_dollars, PlanTier, UsageAction};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a subscription.
///
/// Set by the external billing provider's webhooks; this pipeline only
/// reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current
    Active,
    /// In a free trial
    Trialing,
    /// Payment failed, grace period
    PastDue,
    /// Subscription ended
    Canceled,
}

impl SubscriptionStatus {
    /// String form stored in the database
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trialing),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Whether this status entitles the account to its plan quota
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// One user's live billing state, as read from the account store
#[derive(Debug, Clone, Serialize)]
pub struct UsageAccount {
    /// Owning user
    pub user_id: String,
    /// Subscription tier
    pub tier: PlanTier,
    /// Subscription status
    pub status: SubscriptionStatus,
    /// Interview evaluations consumed this period
    pub interviews_used: u32,
    /// Match scoring runs consumed this period
    pub matches_used: u32,
    /// Prepaid pay-per-use balance in cents
    pub balance_cents: i64,
}

impl UsageAccount {
    /// A fresh free-tier account with nothing consumed
    #[must_use]
    pub fn new_free(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tier: PlanTier::Free,
            status: SubscriptionStatus::Active,
            interviews_used: 0,
            matches_used: 0,
            balance_cents: 0,
        }
    }

    /// Usage counter for one action kind
    #[must_use]
    pub fn used(&self, action: UsageAction) -> u32 {
        match action {
            UsageAction::Interview => self.interviews_used,
            UsageAction::Match => self.matches_used,
        }
    }

    /// Prepaid balance in dollars, for API edges
    #[must_use]
    pub fn balance_dollars(&self) -> f64 {
        cents_to_dollars(self.balance_cents)
    }
}
