//! evergreen - Entry point for one retention sweep run

use std::sync::Arc;

use anyhow::Context;
use evergreen::domain::AccountId;
use evergreen::providers::email::GmailMailStore;
use evergreen::{Settings, SweepService};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("evergreen: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(settings.logging.env_filter())
        .init();

    tracing::info!(account = %settings.account.account_id, "Starting evergreen");

    if let Err(e) = run(settings).await {
        tracing::error!("Sweep failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let mut store = GmailMailStore::new(AccountId::from(settings.account.account_id.as_str()));
    store
        .authenticate()
        .await
        .with_context(|| format!("failed to authenticate Gmail account {}", store.account_id()))?;

    let report = SweepService::new(Arc::new(store), &settings.sweep)
        .run()
        .await
        .context("retention sweep aborted")?;

    tracing::info!(
        candidates = report.candidates_found,
        refreshed = report.refreshed_count(),
        skipped = report.skipped,
        failed = report.failures.len(),
        duration_ms = report.duration_ms,
        "Run finished"
    );
    if !report.is_success() {
        tracing::warn!(
            failed = report.failures.len(),
            "Some due threads were not refreshed"
        );
    }
    Ok(())
}
