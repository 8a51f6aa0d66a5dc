//! AccountStore - SQLite-backed usage accounts
//!
//! The store is the only writer of quota counters and balances, and
//! every mutation is a single conditional UPDATE checked through
//! `rows_affected`. The meter's check-then-charge crosses an await
//! point, so correctness lives in these statements, not in any
//! in-process lock.

use crate::account::{SubscriptionStatus, UsageAccount};
use crate::error::{Error, Result};
use crate::plans::{PlanTier, UsageAction};
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Persistent interface the usage meter runs against
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Load the live account for a user. Unknown users are an error;
    /// accounts are never fabricated here.
    async fn get(&self, user_id: &str) -> Result<UsageAccount>;

    /// Create or replace an account row (provisioning and tests)
    async fn upsert(&self, account: &UsageAccount) -> Result<()>;

    /// Consume one unit of plan quota for `action` iff the counter is
    /// still below `limit`. Returns whether the quota was consumed.
    async fn try_consume_plan_quota(
        &self,
        user_id: &str,
        action: UsageAction,
        limit: u32,
    ) -> Result<bool>;

    /// Charge `amount_cents` from the prepaid balance and count the
    /// action, iff the balance covers it, in one conditional statement.
    /// Returns whether the charge was applied.
    async fn try_charge_balance(
        &self,
        user_id: &str,
        action: UsageAction,
        amount_cents: i64,
    ) -> Result<bool>;

    /// Zero both usage counters (billing-period rollover, triggered
    /// externally)
    async fn reset_counters(&self, user_id: &str) -> Result<()>;
}

/// Database column holding the usage counter for an action
fn used_column(action: UsageAction) -> &'static str {
    match action {
        UsageAction::Interview => "interviews_used",
        UsageAction::Match => "matches_used",
    }
}

/// SQLite implementation of [`AccountStore`]
#[derive(Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Create a store over an existing connection pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and run migrations
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Database(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("SQLite account store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a new in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        debug!("In-memory SQLite account store initialized");
        Ok(store)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_accounts (
                user_id TEXT PRIMARY KEY,
                tier TEXT NOT NULL DEFAULT 'free',
                status TEXT NOT NULL DEFAULT 'active',
                interviews_used INTEGER NOT NULL DEFAULT 0,
                matches_used INTEGER NOT NULL DEFAULT 0,
                balance_cents INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Account store migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl AccountStore for SqliteAccountStore {
    async fn get(&self, user_id: &str) -> Result<UsageAccount> {
        let row = sqlx::query(
            r#"
            SELECT tier, status, interviews_used, matches_used, balance_cents
            FROM usage_accounts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;

        let tier: String = row
            .try_get("tier")
            .map_err(|e| Error::Database(e.to_string()))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| Error::Database(e.to_string()))?;
        let interviews_used: i64 = row
            .try_get("interviews_used")
            .map_err(|e| Error::Database(e.to_string()))?;
        let matches_used: i64 = row
            .try_get("matches_used")
            .map_err(|e| Error::Database(e.to_string()))?;
        let balance_cents: i64 = row
            .try_get("balance_cents")
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(UsageAccount {
            user_id: user_id.to_string(),
            tier: PlanTier::parse(&tier)
                .ok_or_else(|| Error::Database(format!("unknown tier in store: {tier}")))?,
            status: SubscriptionStatus::parse(&status)
                .ok_or_else(|| Error::Database(format!("unknown status in store: {status}")))?,
            interviews_used: interviews_used as u32,
            matches_used: matches_used as u32,
            balance_cents,
        })
    }

    async fn upsert(&self, account: &UsageAccount) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO usage_accounts (
                user_id, tier, status, interviews_used, matches_used,
                balance_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                tier = excluded.tier,
                status = excluded.status,
                interviews_used = excluded.interviews_used,
                matches_used = excluded.matches_used,
                balance_cents = excluded.balance_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&account.user_id)
        .bind(account.tier.as_str())
        .bind(account.status.as_str())
        .bind(i64::from(account.interviews_used))
        .bind(i64::from(account.matches_used))
        .bind(account.balance_cents)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!(user_id = %account.user_id, "upserted usage account");
        Ok(())
    }

    async fn try_consume_plan_quota(
        &self,
        user_id: &str,
        action: UsageAction,
        limit: u32,
    ) -> Result<bool> {
        let column = used_column(action);
        let sql = format!(
            "UPDATE usage_accounts \
             SET {column} = {column} + 1, updated_at = ?3 \
             WHERE user_id = ?1 AND {column} < ?2"
        );

        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(i64::from(limit))
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_charge_balance(
        &self,
        user_id: &str,
        action: UsageAction,
        amount_cents: i64,
    ) -> Result<bool> {
        let column = used_column(action);
        let sql = format!(
            "UPDATE usage_accounts \
             SET balance_cents = balance_cents - ?2, {column} = {column} + 1, updated_at = ?3 \
             WHERE user_id = ?1 AND balance_cents >= ?2"
        );

        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(amount_cents)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_counters(&self, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE usage_accounts
            SET interviews_used = 0, matches_used = 0, updated_at = ?2
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::UnknownUser(user_id.to_string()));
        }

        debug!(user_id, "reset usage counters");
        Ok(())
    }
}
