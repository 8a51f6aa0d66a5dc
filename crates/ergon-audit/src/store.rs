//! AuditStore - SQLite-backed audit rows
//!
//! One aggregate row per completed request in `audit_requests`, one
//! child row per LLM call in `audit_llm_calls`. Parent and children are
//! written in a single transaction so a crash can never leave orphaned
//! call rows.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Aggregate audit row for one completed request
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Row id
    pub id: String,
    /// Correlation id of the request
    pub request_id: String,
    /// Authenticated user, when known
    pub user_id: Option<String>,
    /// API key used, when known
    pub api_key_id: Option<String>,
    /// Raw request path
    pub endpoint: String,
    /// HTTP method
    pub method: String,
    /// Classified API area
    pub module: String,
    /// Classified route name with ids normalized
    pub api_name: String,
    /// Response status code (499 for client disconnects)
    pub status_code: u16,
    /// Wall time of the request in milliseconds
    pub duration_ms: u64,
    /// Prompt tokens across all LLM calls
    pub prompt_tokens: u64,
    /// Completion tokens across all LLM calls
    pub completion_tokens: u64,
    /// Total tokens across all LLM calls
    pub total_tokens: u64,
    /// Number of LLM calls made
    pub llm_call_count: u32,
    /// Accumulated cost in USD
    pub cost: f64,
    /// Provider of the most recent LLM call
    pub provider: Option<String>,
    /// Model of the most recent LLM call
    pub model: Option<String>,
    /// Caller IP, when known
    pub ip_address: Option<String>,
    /// Caller user agent, when known
    pub user_agent: Option<String>,
    /// When the row was written
    pub created_at: DateTime<Utc>,
}

/// Child audit row narrowing token/cost/latency fields to one LLM call
#[derive(Debug, Clone)]
pub struct AuditLlmCall {
    /// Row id
    pub id: String,
    /// Parent `audit_requests` row id
    pub audit_id: String,
    /// Model slug
    pub model: String,
    /// Provider name
    pub provider: String,
    /// Prompt tokens for this call
    pub prompt_tokens: u32,
    /// Completion tokens for this call
    pub completion_tokens: u32,
    /// Total tokens for this call
    pub total_tokens: u32,
    /// Priced cost of this call (USD)
    pub cost: f64,
    /// Call latency in milliseconds
    pub duration_ms: u64,
}

/// Append-only sink the persister writes completed requests into
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    /// Write one aggregate entry and its per-call children atomically
    async fn record(&self, entry: &AuditEntry, calls: &[AuditLlmCall]) -> Result<()>;
}

/// SQLite implementation of [`AuditSink`] with query helpers
#[derive(Clone)]
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
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

        info!("SQLite audit store initialized at {}", db_path.display());
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

        debug!("In-memory SQLite audit store initialized");
        Ok(store)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_requests (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                user_id TEXT,
                api_key_id TEXT,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL,
                module TEXT NOT NULL,
                api_name TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                llm_call_count INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0,
                provider TEXT,
                model TEXT,
                ip_address TEXT,
                user_agent TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_llm_calls (
                id TEXT PRIMARY KEY,
                audit_id TEXT NOT NULL,
                model TEXT NOT NULL,
                provider TEXT NOT NULL,
                prompt_tokens INTEGER NOT NULL,
                completion_tokens INTEGER NOT NULL,
                total_tokens INTEGER NOT NULL,
                cost REAL NOT NULL,
                duration_ms INTEGER NOT NULL,
                FOREIGN KEY (audit_id) REFERENCES audit_requests(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_audit_requests_request
            ON audit_requests(request_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_audit_requests_created
            ON audit_requests(created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_audit_llm_calls_audit
            ON audit_llm_calls(audit_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Audit store migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fetch the aggregate entry for a request id
    pub async fn get_by_request_id(&self, request_id: &str) -> Result<AuditEntry> {
        let row = sqlx::query(
            r#"
            SELECT id, request_id, user_id, api_key_id, endpoint, method,
                   module, api_name, status_code, duration_ms,
                   prompt_tokens, completion_tokens, total_tokens,
                   llm_call_count, cost, provider, model,
                   ip_address, user_agent, created_at
            FROM audit_requests
            WHERE request_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?
        .ok_or_else(|| Error::NotFound(request_id.to_string()))?;

        row_to_entry(&row)
    }

    /// Fetch the child call rows for an aggregate entry
    pub async fn llm_calls_for(&self, audit_id: &str) -> Result<Vec<AuditLlmCall>> {
        let rows = sqlx::query(
            r#"
            SELECT id, audit_id, model, provider, prompt_tokens,
                   completion_tokens, total_tokens, cost, duration_ms
            FROM audit_llm_calls
            WHERE audit_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(audit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.iter().map(row_to_call).collect()
    }

    /// Number of aggregate rows written for a request id
    pub async fn count_for_request(&self, request_id: &str) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_requests WHERE request_id = ?1")
            .bind(request_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(n as u64)
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEntry> {
    let get_err = |e: sqlx::Error| Error::Database(e.to_string());

    let created_at: String = row.try_get("created_at").map_err(get_err)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Database(format!("bad created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(AuditEntry {
        id: row.try_get("id").map_err(get_err)?,
        request_id: row.try_get("request_id").map_err(get_err)?,
        user_id: row.try_get("user_id").map_err(get_err)?,
        api_key_id: row.try_get("api_key_id").map_err(get_err)?,
        endpoint: row.try_get("endpoint").map_err(get_err)?,
        method: row.try_get("method").map_err(get_err)?,
        module: row.try_get("module").map_err(get_err)?,
        api_name: row.try_get("api_name").map_err(get_err)?,
        status_code: row.try_get::<i64, _>("status_code").map_err(get_err)? as u16,
        duration_ms: row.try_get::<i64, _>("duration_ms").map_err(get_err)? as u64,
        prompt_tokens: row.try_get::<i64, _>("prompt_tokens").map_err(get_err)? as u64,
        completion_tokens: row.try_get::<i64, _>("completion_tokens").map_err(get_err)? as u64,
        total_tokens: row.try_get::<i64, _>("total_tokens").map_err(get_err)? as u64,
        llm_call_count: row.try_get::<i64, _>("llm_call_count").map_err(get_err)? as u32,
        cost: row.try_get("cost").map_err(get_err)?,
        provider: row.try_get("provider").map_err(get_err)?,
        model: row.try_get("model").map_err(get_err)?,
        ip_address: row.try_get("ip_address").map_err(get_err)?,
        user_agent: row.try_get("user_agent").map_err(get_err)?,
        created_at,
    })
}

fn row_to_call(row: &sqlx::sqlite::SqliteRow) -> Result<AuditLlmCall> {
    let get_err = |e: sqlx::Error| Error::Database(e.to_string());

    Ok(AuditLlmCall {
        id: row.try_get("id").map_err(get_err)?,
        audit_id: row.try_get("audit_id").map_err(get_err)?,
        model: row.try_get("model").map_err(get_err)?,
        provider: row.try_get("provider").map_err(get_err)?,
        prompt_tokens: row.try_get::<i64, _>("prompt_tokens").map_err(get_err)? as u32,
        completion_tokens: row.try_get::<i64, _>("completion_tokens").map_err(get_err)? as u32,
        total_tokens: row.try_get::<i64, _>("total_tokens").map_err(get_err)? as u32,
        cost: row.try_get("cost").map_err(get_err)?,
        duration_ms: row.try_get::<i64, _>("duration_ms").map_err(get_err)? as u64,
    })
}

/// Mint a fresh audit row id
#[must_use]
pub(crate) fn new_row_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait::async_trait]
impl AuditSink for SqliteAuditStore {
    async fn record(&self, entry: &AuditEntry, calls: &[AuditLlmCall]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO audit_requests (
                id, request_id, user_id, api_key_id, endpoint, method,
                module, api_name, status_code, duration_ms,
                prompt_tokens, completion_tokens, total_tokens,
                llm_call_count, cost, provider, model,
                ip_address, user_agent, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18, ?19, ?20
            )
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.request_id)
        .bind(&entry.user_id)
        .bind(&entry.api_key_id)
        .bind(&entry.endpoint)
        .bind(&entry.method)
        .bind(&entry.module)
        .bind(&entry.api_name)
        .bind(i64::from(entry.status_code))
        .bind(entry.duration_ms as i64)
        .bind(entry.prompt_tokens as i64)
        .bind(entry.completion_tokens as i64)
        .bind(entry.total_tokens as i64)
        .bind(i64::from(entry.llm_call_count))
        .bind(entry.cost)
        .bind(&entry.provider)
        .bind(&entry.model)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        for call in calls {
            sqlx::query(
                r#"
                INSERT INTO audit_llm_calls (
                    id, audit_id, model, provider, prompt_tokens,
                    completion_tokens, total_tokens, cost, duration_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&call.id)
            .bind(&call.audit_id)
            .bind(&call.model)
            .bind(&call.provider)
            .bind(i64::from(call.prompt_tokens))
            .bind(i64::from(call.completion_tokens))
            .bind(i64::from(call.total_tokens))
            .bind(call.cost)
            .bind(call.duration_ms as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        debug!(
            request_id = %entry.request_id,
            llm_calls = calls.len(),
            "audit entry recorded"
        );
        Ok(())
    }
}
