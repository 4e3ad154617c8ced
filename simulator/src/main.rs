//! MultiWallet Simulator
//!
//! Test environment driving concurrent wallet workloads against the
//! file-backed stores.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multiwallet_common::{CurrencyCode, RateEntry};
use multiwallet_engine::{TransactionConfig, TransactionEngine, WalletManager};
use multiwallet_rates::{NbpRateSource, RateRefresher};
use multiwallet_store::{FileRateStore, FileWalletStore, RateStore, WalletStore};

mod metrics;
mod scenario;

use scenario::Scenario;

/// MultiWallet Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "MultiWallet test and simulation environment")]
struct Args {
    /// Directory holding the wallet and rate files
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Number of wallets to run the workload against
    #[arg(short, long, default_value = "4")]
    wallets: usize,

    /// Concurrent worker tasks
    #[arg(long, default_value = "8")]
    workers: usize,

    /// Operations per worker
    #[arg(long, default_value = "50")]
    ops: usize,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Fetch a live NBP table instead of seeding the built-in one
    #[arg(long)]
    nbp: bool,

    /// Per-operation wallet lock wait in milliseconds
    #[arg(long, default_value = "5000")]
    lock_wait_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting MultiWallet Simulator");

    std::fs::create_dir_all(&args.data_dir)?;
    let wallet_store: Arc<dyn WalletStore> =
        Arc::new(FileWalletStore::open(args.data_dir.join("wallets.json")).await);
    let rate_store: Arc<dyn RateStore> =
        Arc::new(FileRateStore::open(args.data_dir.join("rates.json")).await);

    if args.nbp {
        let refresher = Arc::new(RateRefresher::new(
            Arc::new(NbpRateSource::new()),
            rate_store.clone(),
        ));
        let fetched = refresher.refresh_once().await?;
        info!(entries = fetched, "Fetched live NBP table");

        // keep the table fresh for long runs
        let background = refresher.clone();
        tokio::spawn(async move { background.run().await });
    } else if rate_store.list().await?.is_empty() {
        rate_store.save(builtin_table()).await?;
        info!("Seeded built-in rate table");
    }

    let manager = WalletManager::new(wallet_store.clone(), rate_store.clone());
    let engine = Arc::new(TransactionEngine::with_config(
        wallet_store,
        rate_store.clone(),
        TransactionConfig {
            lock_wait: Duration::from_millis(args.lock_wait_ms),
        },
    ));

    // reuse wallets from a previous run, create the rest
    let mut wallet_ids: Vec<_> = manager.wallets().await?.iter().map(|w| w.id).collect();
    let initial_codes = [CurrencyCode::new("USD"), CurrencyCode::new("EUR")];
    while wallet_ids.len() < args.wallets {
        let wallet = manager
            .create_wallet(format!("wallet-{}", wallet_ids.len()), &initial_codes)
            .await?;
        wallet_ids.push(wallet.id);
    }
    wallet_ids.truncate(args.wallets);

    // trade among whichever of these the rate table actually knows
    let table = rate_store.list().await?;
    let codes: Vec<CurrencyCode> = ["USD", "EUR", "GBP", "CHF"]
        .iter()
        .map(|c| CurrencyCode::new(*c))
        .filter(|c| table.iter().any(|e| e.code == *c))
        .collect();
    anyhow::ensure!(codes.len() >= 2, "rate table knows too few currencies");

    let scenario = Scenario {
        workers: args.workers,
        ops_per_worker: args.ops,
        seed: args.seed,
    };
    let report = scenario.run(engine, wallet_ids, codes).await?;

    info!("Simulation complete");
    info!("Attempted: {}", report.attempted);
    info!("Succeeded: {}", report.succeeded);
    info!("Rejected (business rule): {}", report.rejected);
    info!("Lock timeouts: {}", report.lock_timeouts);
    info!("Storage failures: {}", report.storage_failures);
    info!("Success rate: {:.1}%", report.success_rate() * 100.0);

    for wallet in manager.wallets().await? {
        for balance in wallet.balances() {
            info!(
                wallet = %wallet.id,
                name = %wallet.name,
                code = %balance.code,
                amount = %balance.amount(),
                "Final balance"
            );
        }
    }

    Ok(())
}

fn builtin_table() -> Vec<RateEntry> {
    vec![
        RateEntry::new(CurrencyCode::new("USD"), "dolar amerykański", dec!(4.02)),
        RateEntry::new(CurrencyCode::new("EUR"), "euro", dec!(4.32)),
        RateEntry::new(CurrencyCode::new("GBP"), "funt szterling", dec!(5.11)),
        RateEntry::new(CurrencyCode::new("CHF"), "frank szwajcarski", dec!(4.60)),
    ]
}
