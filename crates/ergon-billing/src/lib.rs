//! Ergon Billing - plans, balances and usage metering
//!
//! Every billable action (an interview evaluation, a match scoring run)
//! passes through the [`UsageMeter`] before any provider cost is
//! incurred: plan quota first, prepaid balance second, rejection third.
//! The account store keeps quota counters and balances in SQLite and
//! mutates them only through conditional single-statement updates, so
//! interleaved requests can never overdraw a balance or blow past a
//! plan limit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod error;
pub mod meter;
pub mod plans;
pub mod store;

pub use account::{SubscriptionStatus, UsageAccount};
pub use error::{Error, RejectionDetails, Result};
pub use meter::{Admission, AdmissionSource, UsageMeter};
pub use plans::{cents_to_dollars, PlanLimits, PlanTier, UsageAction};
pub use store::{AccountStore, SqliteAccountStore};
