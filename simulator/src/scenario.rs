//! Concurrent workload driver.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use multiwallet_common::{CurrencyCode, WalletError, WalletId};
use multiwallet_engine::TransactionEngine;

use crate::metrics::SimulationMetrics;

/// A mixed deposit/withdraw/exchange workload.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Concurrent worker tasks.
    pub workers: usize,
    /// Operations each worker performs.
    pub ops_per_worker: usize,
    /// Seed for reproducible runs.
    pub seed: u64,
}

impl Scenario {
    /// Seed every wallet with starting funds, then run all workers to
    /// completion and return the merged metrics.
    pub async fn run(
        &self,
        engine: Arc<TransactionEngine>,
        wallets: Vec<WalletId>,
        codes: Vec<CurrencyCode>,
    ) -> anyhow::Result<SimulationMetrics> {
        for &wallet_id in &wallets {
            engine
                .deposit(wallet_id, codes[0].clone(), dec!(10000))
                .await?;
        }
        info!(
            wallets = wallets.len(),
            workers = self.workers,
            ops_per_worker = self.ops_per_worker,
            "Workload starting"
        );

        let mut tasks = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let engine = engine.clone();
            let wallets = wallets.clone();
            let codes = codes.clone();
            let seed = self.seed.wrapping_add(worker as u64);
            let ops = self.ops_per_worker;

            tasks.push(tokio::spawn(async move {
                run_worker(worker, engine, wallets, codes, seed, ops).await
            }));
        }

        let mut total = SimulationMetrics::new();
        for task in tasks {
            total.merge(&task.await?);
        }
        Ok(total)
    }
}

async fn run_worker(
    worker: usize,
    engine: Arc<TransactionEngine>,
    wallets: Vec<WalletId>,
    codes: Vec<CurrencyCode>,
    seed: u64,
    ops: usize,
) -> SimulationMetrics {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut metrics = SimulationMetrics::new();

    for _ in 0..ops {
        let wallet_id = wallets[rng.gen_range(0..wallets.len())];
        let amount = Decimal::new(rng.gen_range(100..50_000), 2);

        // pick two distinct currencies; same-currency exchange is the
        // caller layer's job to reject, so the workload never issues one
        let source_idx = rng.gen_range(0..codes.len());
        let mut target_idx = rng.gen_range(0..codes.len() - 1);
        if target_idx >= source_idx {
            target_idx += 1;
        }
        let source = codes[source_idx].clone();
        let target = codes[target_idx].clone();

        let result = match rng.gen_range(0..4u8) {
            0 => engine.deposit(wallet_id, source, amount).await.map(|_| ()),
            1 => engine.withdraw(wallet_id, source, amount).await.map(|_| ()),
            2 => engine
                .exchange_from(wallet_id, source, target, amount)
                .await
                .map(|_| ()),
            _ => engine
                .exchange_to(wallet_id, source, target, amount)
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) => metrics.record_success(),
            Err(e) if e.is_business_rule() => {
                debug!(worker, error = %e, "Operation rejected");
                metrics.record_rejection();
            }
            Err(WalletError::LockTimeout { .. }) => metrics.record_lock_timeout(),
            Err(e) => {
                debug!(worker, error = %e, "Operation failed");
                metrics.record_storage_failure();
            }
        }
    }

    metrics
}
