//! Plan tiers, monthly allowances and pay-per-use rates
//!
//! Money is carried as integer cents everywhere inside this crate and
//! only converted to dollars at API edges, so balance arithmetic stays
//! exact and the store's conditional updates compare integers.

use serde::{Deserialize, Serialize};

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Free evaluation tier
    Free,
    /// Entry paid tier
    Starter,
    /// Mid paid tier
    Growth,
    /// Top paid tier
    Scale,
}

impl PlanTier {
    /// String form stored in the database
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Scale => "scale",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Self::Free),
            "starter" => Some(Self::Starter),
            "growth" => Some(Self::Growth),
            "scale" => Some(Self::Scale),
            _ => None,
        }
    }

    /// Monthly allowances included in this tier
    #[must_use]
    pub fn limits(&self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits {
                interviews: 2,
                matches: 10,
            },
            Self::Starter => PlanLimits {
                interviews: 15,
                matches: 150,
            },
            Self::Growth => PlanLimits {
                interviews: 60,
                matches: 600,
            },
            Self::Scale => PlanLimits {
                interviews: 250,
                matches: 2500,
            },
        }
    }
}

/// Included monthly allowance per billable action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    /// Interview evaluations per month
    pub interviews: u32,
    /// Match scoring runs per month
    pub matches: u32,
}

impl PlanLimits {
    /// The allowance covering one action kind
    #[must_use]
    pub fn for_action(&self, action: UsageAction) -> u32 {
        match action {
            UsageAction::Interview => self.interviews,
            UsageAction::Match => self.matches,
        }
    }
}

/// A billable action gated by the usage meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageAction {
    /// One interview evaluation
    Interview,
    /// One candidate/job match scoring run
    Match,
}

impl UsageAction {
    /// String form used in rejection payloads and audit metadata
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interview => "interview",
            Self::Match => "match",
        }
    }

    /// Pay-per-use price in cents, charged beyond plan quota
    #[must_use]
    pub fn rate_cents(&self) -> i64 {
        match self {
            Self::Interview => 200,
            Self::Match => 50,
        }
    }
}

/// Convert integer cents to dollars for API edges
#[must_use]
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}
