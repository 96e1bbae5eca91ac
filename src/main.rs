use dotenvy::dotenv;
use std::{env, time::Duration};
use timebank_ledger::{
    bot,
    config::{database, settings},
    core::timebank::TimeBank,
    errors::{Error, Result},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Runs the reconciliation sweep forever at a fixed interval.
async fn run_periodic_sweep(timebank: TimeBank, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; the startup sweep already ran.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = timebank.run_sweep().await {
            error!("Reconciliation sweep failed: {e}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Ledger settings
    let ledger_settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load ledger settings: {e}"))?;
    info!(?ledger_settings, "Loaded ledger settings");

    // 4. Store
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to the database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))?;

    let sweep_every = Duration::from_secs(ledger_settings.sweep_interval_secs);
    let timebank = TimeBank::new(db, ledger_settings);

    // 5. Reconcile anything a previous run left half-done
    match timebank.run_sweep().await {
        Ok(report) if !report.is_clean() => {
            info!(
                backfilled = report.backfilled.len(),
                violations = report.violations.len(),
                repaired = report.repaired_balances.len(),
                "Startup sweep made changes"
            );
        }
        Ok(_) => {}
        Err(e) => error!("Startup sweep failed: {e}"),
    }
    if !sweep_every.is_zero() {
        tokio::spawn(run_periodic_sweep(timebank.clone(), sweep_every));
    }

    // 6. Run the bot
    let token = env::var("DISCORD_BOT_TOKEN").map_err(|e| Error::Config {
        message: format!("DISCORD_BOT_TOKEN not set: {e}"),
    })?;

    bot::run_bot(token, timebank).await
}
