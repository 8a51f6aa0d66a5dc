//! Command-line interface for Ergon
//!
//! Provides operational commands:
//! - `serve`: Run the API server
//! - `seed`: Create or reset a usage account in the billing store

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ergon_billing::{AccountStore, PlanTier, SqliteAccountStore, SubscriptionStatus, UsageAccount};

/// Ergon recruitment API CLI
#[derive(Parser, Debug)]
#[command(name = "ergon")]
#[command(about = "LLM-backed recruitment API with usage billing")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server
    Serve,
    /// Create or reset a usage account
    Seed {
        /// User id to seed
        user_id: String,
        /// Plan tier (free, starter, growth, scale)
        #[arg(long, default_value = "free")]
        tier: String,
        /// Subscription status (active, trialing, past_due, canceled)
        #[arg(long, default_value = "active")]
        status: String,
        /// Prepaid top-up balance in cents
        #[arg(long, default_value_t = 0)]
        balance_cents: i64,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Seed {
            user_id,
            tier,
            status,
            balance_cents,
        }) => seed(user_id, &tier, &status, balance_cents).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Upsert a usage account with fresh counters
async fn seed(
    user_id: String,
    tier: &str,
    status: &str,
    balance_cents: i64,
) -> anyhow::Result<()> {
    let tier = PlanTier::parse(tier)
        .with_context(|| format!("unknown tier '{tier}' (expected free, starter, growth, scale)"))?;
    let status = SubscriptionStatus::parse(status).with_context(|| {
        format!("unknown status '{status}' (expected active, trialing, past_due, canceled)")
    })?;

    let config = crate::server::load_config().context("failed to load configuration")?;
    let store = SqliteAccountStore::from_path(Path::new(&config.database.billing_path))
        .await
        .context("failed to open billing store")?;

    let account = UsageAccount {
        user_id,
        tier,
        status,
        interviews_used: 0,
        matches_used: 0,
        balance_cents,
    };
    store.upsert(&account).await?;

    println!(
        "Seeded account '{}': tier={}, status={}, balance={} cents",
        account.user_id,
        account.tier.as_str(),
        account.status.as_str(),
        account.balance_cents
    );
    Ok(())
}
