//! Wallet transaction engine.
//!
//! Every operation follows the same skeleton: acquire the wallet lock (fail
//! fast on timeout), load the wallet, resolve the needed rate entries,
//! validate, mutate, persist, release. The lock is held across the whole
//! load-to-persist sequence, so no other operation on the same wallet can
//! observe or produce an intermediate state.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use multiwallet_common::{
    CurrencyBalance, CurrencyCode, RateEntry, Wallet, WalletError, WalletId,
};
use multiwallet_store::{RateStore, WalletStore};

use crate::lock::WalletLockManager;

/// Configuration for the transaction engine.
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Maximum time a transaction waits for the per-wallet lock.
    pub lock_wait: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(5),
        }
    }
}

/// Post-mutation balances of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    /// Source currency balance after the debit.
    pub source: CurrencyBalance,
    /// Target currency balance after the credit.
    pub target: CurrencyBalance,
}

/// Applies balance mutations to wallets under the per-wallet lock.
///
/// Conversions always pivot through the reference currency (PLN): an amount
/// is multiplied by its currency's mid rate into PLN, then divided by the
/// other currency's mid rate. The engine never substitutes a default rate;
/// a code missing from the table is a typed failure.
pub struct TransactionEngine {
    wallets: Arc<dyn WalletStore>,
    rates: Arc<dyn RateStore>,
    locks: WalletLockManager,
    config: TransactionConfig,
}

impl TransactionEngine {
    /// Create an engine with the default configuration.
    pub fn new(wallets: Arc<dyn WalletStore>, rates: Arc<dyn RateStore>) -> Self {
        Self::with_config(wallets, rates, TransactionConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(
        wallets: Arc<dyn WalletStore>,
        rates: Arc<dyn RateStore>,
        config: TransactionConfig,
    ) -> Self {
        Self {
            wallets,
            rates,
            locks: WalletLockManager::new(),
            config,
        }
    }

    /// Add funds to a wallet, creating the balance entry at zero if the
    /// wallet does not hold the currency yet. There is no upper bound on a
    /// balance.
    #[instrument(skip(self))]
    pub async fn deposit(
        &self,
        wallet_id: WalletId,
        code: CurrencyCode,
        amount: Decimal,
    ) -> Result<CurrencyBalance, WalletError> {
        let _lock = self.locks.acquire(wallet_id, self.config.lock_wait).await?;

        let mut wallet = self.load_wallet(wallet_id).await?;
        let rate = self.resolve_rate(&code).await?;

        let balance = wallet.ensure_balance(&rate.code, &rate.name);
        balance.credit(amount);
        let deposited = balance.clone();

        self.wallets.update(&wallet).await?;
        info!(
            wallet_id = %wallet_id,
            code = %deposited.code,
            balance = %deposited.amount(),
            "Deposit applied"
        );
        Ok(deposited)
    }

    /// Remove funds from a wallet.
    ///
    /// Distinguishes a code the rate system has never heard of
    /// (`CurrencyNotFound`) from one the wallet simply does not hold
    /// (`CurrencyNotInWallet`).
    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        wallet_id: WalletId,
        code: CurrencyCode,
        amount: Decimal,
    ) -> Result<CurrencyBalance, WalletError> {
        let _lock = self.locks.acquire(wallet_id, self.config.lock_wait).await?;

        let mut wallet = self.load_wallet(wallet_id).await?;
        self.resolve_rate(&code).await?;

        let balance = wallet
            .balance_mut(&code)
            .ok_or_else(|| WalletError::CurrencyNotInWallet(code.clone()))?;

        let available = balance.amount();
        if available < amount {
            return Err(WalletError::NotEnoughFunds { available });
        }

        balance.debit(amount);
        let withdrawn = balance.clone();

        self.wallets.update(&wallet).await?;
        info!(
            wallet_id = %wallet_id,
            code = %withdrawn.code,
            balance = %withdrawn.amount(),
            "Withdrawal applied"
        );
        Ok(withdrawn)
    }

    /// Exchange a fixed source amount into however much target currency it
    /// buys. Funds are checked in source-currency units, before conversion.
    #[instrument(skip(self))]
    pub async fn exchange_from(
        &self,
        wallet_id: WalletId,
        source: CurrencyCode,
        target: CurrencyCode,
        amount: Decimal,
    ) -> Result<ExchangeOutcome, WalletError> {
        let _lock = self.locks.acquire(wallet_id, self.config.lock_wait).await?;

        let mut wallet = self.load_wallet(wallet_id).await?;
        let source_rate = self.resolve_rate(&source).await?;
        let target_rate = self.resolve_rate(&target).await?;

        let source_after = {
            let balance = wallet
                .balance_mut(&source)
                .ok_or_else(|| WalletError::CurrencyNotInWallet(source.clone()))?;
            let available = balance.amount();
            if available < amount {
                return Err(WalletError::NotEnoughFunds { available });
            }
            balance.debit(amount);
            balance.clone()
        };

        let reference_amount = amount * source_rate.mid;
        let target_amount = reference_amount / target_rate.mid;

        let target_after = {
            let balance = wallet.ensure_balance(&target_rate.code, &target_rate.name);
            balance.credit(target_amount);
            balance.clone()
        };

        self.wallets.update(&wallet).await?;
        info!(
            wallet_id = %wallet_id,
            source = %source_after.code,
            target = %target_after.code,
            source_balance = %source_after.amount(),
            target_balance = %target_after.amount(),
            "Exchange (fixed source) applied"
        );
        Ok(ExchangeOutcome {
            source: source_after,
            target: target_after,
        })
    }

    /// Exchange toward a fixed target amount, debiting whatever source
    /// amount that requires.
    #[instrument(skip(self))]
    pub async fn exchange_to(
        &self,
        wallet_id: WalletId,
        source: CurrencyCode,
        target: CurrencyCode,
        amount: Decimal,
    ) -> Result<ExchangeOutcome, WalletError> {
        let _lock = self.locks.acquire(wallet_id, self.config.lock_wait).await?;

        let mut wallet = self.load_wallet(wallet_id).await?;
        let source_rate = self.resolve_rate(&source).await?;
        let target_rate = self.resolve_rate(&target).await?;

        let reference_amount = amount * target_rate.mid;
        let required_source = reference_amount / source_rate.mid;

        let source_after = {
            let balance = wallet
                .balance_mut(&source)
                .ok_or_else(|| WalletError::CurrencyNotInWallet(source.clone()))?;
            let available = balance.amount();
            if available < required_source {
                return Err(WalletError::NotEnoughFunds { available });
            }
            balance.debit(required_source);
            balance.clone()
        };

        let target_after = {
            let balance = wallet.ensure_balance(&target_rate.code, &target_rate.name);
            balance.credit(amount);
            balance.clone()
        };

        self.wallets.update(&wallet).await?;
        info!(
            wallet_id = %wallet_id,
            source = %source_after.code,
            target = %target_after.code,
            source_balance = %source_after.amount(),
            target_balance = %target_after.amount(),
            "Exchange (fixed target) applied"
        );
        Ok(ExchangeOutcome {
            source: source_after,
            target: target_after,
        })
    }

    async fn load_wallet(&self, id: WalletId) -> Result<Wallet, WalletError> {
        self.wallets
            .get(id)
            .await?
            .ok_or(WalletError::WalletNotFound(id))
    }

    async fn resolve_rate(&self, code: &CurrencyCode) -> Result<RateEntry, WalletError> {
        self.rates
            .lookup(code)
            .await?
            .ok_or_else(|| WalletError::CurrencyNotFound(code.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use multiwallet_common::StorageError;
    use multiwallet_store::FileWalletStore;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    /// In-memory wallet store, standing in for the file store.
    struct MemoryWalletStore {
        wallets: Mutex<Vec<Wallet>>,
    }

    impl MemoryWalletStore {
        fn new() -> Self {
            Self {
                wallets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WalletStore for MemoryWalletStore {
        async fn create(
            &self,
            name: String,
            balances: Vec<CurrencyBalance>,
        ) -> Result<Wallet, StorageError> {
            let mut wallets = self.wallets.lock().await;
            let wallet = Wallet::new(WalletId::new(wallets.len() as u64), name, balances);
            wallets.push(wallet.clone());
            Ok(wallet)
        }

        async fn list(&self) -> Result<Vec<Wallet>, StorageError> {
            Ok(self.wallets.lock().await.clone())
        }

        async fn get(&self, id: WalletId) -> Result<Option<Wallet>, StorageError> {
            Ok(self.wallets.lock().await.iter().find(|w| w.id == id).cloned())
        }

        async fn update(&self, wallet: &Wallet) -> Result<(), StorageError> {
            let mut wallets = self.wallets.lock().await;
            let stored = wallets
                .iter_mut()
                .find(|w| w.id == wallet.id)
                .ok_or(StorageError::WalletMissing(wallet.id))?;
            stored.set_balances(wallet.balances().to_vec());
            Ok(())
        }
    }

    struct MemoryRateStore {
        entries: Mutex<Vec<RateEntry>>,
    }

    impl MemoryRateStore {
        fn new(entries: Vec<RateEntry>) -> Self {
            Self {
                entries: Mutex::new(entries),
            }
        }
    }

    #[async_trait]
    impl RateStore for MemoryRateStore {
        async fn save(&self, entries: Vec<RateEntry>) -> Result<(), StorageError> {
            *self.entries.lock().await = entries;
            Ok(())
        }

        async fn lookup(&self, code: &CurrencyCode) -> Result<Option<RateEntry>, StorageError> {
            Ok(self
                .entries
                .lock()
                .await
                .iter()
                .find(|e| e.code == *code)
                .cloned())
        }

        async fn list(&self) -> Result<Vec<RateEntry>, StorageError> {
            Ok(self.entries.lock().await.clone())
        }
    }

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD")
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR")
    }

    fn test_rates() -> Arc<MemoryRateStore> {
        Arc::new(MemoryRateStore::new(vec![
            RateEntry::new(usd(), "US dollar", dec!(4)),
            RateEntry::new(eur(), "euro", dec!(5)),
        ]))
    }

    async fn engine_with_wallet(
        balances: Vec<CurrencyBalance>,
    ) -> (TransactionEngine, WalletId) {
        let wallets = Arc::new(MemoryWalletStore::new());
        let wallet = wallets.create("test".into(), balances).await.unwrap();
        let engine = TransactionEngine::new(wallets, test_rates());
        (engine, wallet.id)
    }

    #[tokio::test]
    async fn test_deposit_adds_to_existing_balance() {
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(50),
        )])
        .await;

        let balance = engine.deposit(id, usd(), dec!(25)).await.unwrap();

        assert_eq!(balance.code, usd());
        assert_eq!(balance.amount(), dec!(75));
    }

    #[tokio::test]
    async fn test_deposit_creates_missing_entry() {
        let (engine, id) = engine_with_wallet(Vec::new()).await;

        let balance = engine.deposit(id, eur(), dec!(10)).await.unwrap();

        assert_eq!(balance.amount(), dec!(10));
        assert_eq!(balance.name, "euro");
    }

    #[tokio::test]
    async fn test_deposit_rounds_half_away_from_zero() {
        let (engine, id) = engine_with_wallet(Vec::new()).await;

        let balance = engine.deposit(id, usd(), dec!(0.005)).await.unwrap();
        assert_eq!(balance.amount(), dec!(0.01));
    }

    #[tokio::test]
    async fn test_deposit_unknown_wallet() {
        let (engine, _) = engine_with_wallet(Vec::new()).await;

        let result = engine.deposit(WalletId::new(99), usd(), dec!(1)).await;
        assert!(matches!(result, Err(WalletError::WalletNotFound(_))));
    }

    #[tokio::test]
    async fn test_deposit_unknown_currency() {
        let (engine, id) = engine_with_wallet(Vec::new()).await;

        let result = engine.deposit(id, CurrencyCode::new("XXX"), dec!(1)).await;
        assert!(matches!(result, Err(WalletError::CurrencyNotFound(_))));
    }

    #[tokio::test]
    async fn test_withdraw_decreases_balance() {
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(100),
        )])
        .await;

        let balance = engine.withdraw(id, usd(), dec!(40)).await.unwrap();
        assert_eq!(balance.amount(), dec!(60));
    }

    #[tokio::test]
    async fn test_withdraw_more_than_available() {
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(30),
        )])
        .await;

        let result = engine.withdraw(id, usd(), dec!(30.01)).await;
        match result {
            Err(WalletError::NotEnoughFunds { available }) => {
                assert_eq!(available, dec!(30));
            }
            other => panic!("expected NotEnoughFunds, got {other:?}"),
        }

        // the failed withdrawal must not have touched the stored balance
        let untouched = engine.withdraw(id, usd(), dec!(30)).await.unwrap();
        assert_eq!(untouched.amount(), dec!(0));
    }

    #[tokio::test]
    async fn test_withdraw_distinguishes_missing_entry_from_unknown_code() {
        let (engine, id) = engine_with_wallet(Vec::new()).await;

        // EUR has a rate but the wallet holds no entry for it
        let result = engine.withdraw(id, eur(), dec!(1)).await;
        assert!(matches!(result, Err(WalletError::CurrencyNotInWallet(_))));

        // XXX is unknown to the rate system altogether
        let result = engine.withdraw(id, CurrencyCode::new("XXX"), dec!(1)).await;
        assert!(matches!(result, Err(WalletError::CurrencyNotFound(_))));
    }

    #[tokio::test]
    async fn test_exchange_from_pivots_through_reference_currency() {
        // 100 USD at rates USD=4, EUR=5: spending 40 USD buys
        // 40 * 4 = 160 PLN, 160 / 5 = 32 EUR
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(100),
        )])
        .await;

        let outcome = engine
            .exchange_from(id, usd(), eur(), dec!(40))
            .await
            .unwrap();

        assert_eq!(outcome.source.amount(), dec!(60));
        assert_eq!(outcome.target.amount(), dec!(32.00));
        assert_eq!(outcome.target.name, "euro");
    }

    #[tokio::test]
    async fn test_exchange_from_checks_funds_in_source_units() {
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(100),
        )])
        .await;

        let result = engine.exchange_from(id, usd(), eur(), dec!(100.01)).await;
        match result {
            Err(WalletError::NotEnoughFunds { available }) => {
                assert_eq!(available, dec!(100));
            }
            other => panic!("expected NotEnoughFunds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_from_requires_source_entry() {
        let (engine, id) = engine_with_wallet(Vec::new()).await;

        let result = engine.exchange_from(id, usd(), eur(), dec!(1)).await;
        assert!(matches!(result, Err(WalletError::CurrencyNotInWallet(_))));
    }

    #[tokio::test]
    async fn test_exchange_to_debits_required_source_amount() {
        // demanding 50 EUR costs 50 * 5 = 250 PLN, 250 / 4 = 62.5 USD
        let (engine, id) = engine_with_wallet(vec![
            CurrencyBalance::with_amount(usd(), "US dollar", dec!(100)),
            CurrencyBalance::with_amount(eur(), "euro", dec!(50)),
        ])
        .await;

        let outcome = engine.exchange_to(id, usd(), eur(), dec!(50)).await.unwrap();

        assert_eq!(outcome.source.amount(), dec!(37.5));
        assert_eq!(outcome.target.amount(), dec!(100));
    }

    #[tokio::test]
    async fn test_exchange_to_fails_when_required_exceeds_balance() {
        // demanding 100 EUR would cost 125 USD
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(100),
        )])
        .await;

        let result = engine.exchange_to(id, usd(), eur(), dec!(100)).await;
        match result {
            Err(WalletError::NotEnoughFunds { available }) => {
                assert_eq!(available, dec!(100));
            }
            other => panic!("expected NotEnoughFunds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_same_currency_exchange_does_not_corrupt_state() {
        // rejected upstream by the caller-facing layer, but the sequential
        // debit-then-credit on one entry must stay consistent regardless
        let (engine, id) = engine_with_wallet(vec![CurrencyBalance::with_amount(
            usd(),
            "US dollar",
            dec!(100),
        )])
        .await;

        let outcome = engine
            .exchange_from(id, usd(), usd(), dec!(40))
            .await
            .unwrap();

        assert_eq!(outcome.target.amount(), dec!(100));
        let balance = engine.withdraw(id, usd(), dec!(100)).await.unwrap();
        assert_eq!(balance.amount(), dec!(0));
    }

    #[tokio::test]
    async fn test_concurrent_mutations_of_one_wallet_serialize() {
        // both tasks go through the real file store; without the wallet lock
        // one deposit would overwrite the other
        let dir = tempfile::tempdir().unwrap();
        let wallets: Arc<dyn WalletStore> =
            Arc::new(FileWalletStore::open(dir.path().join("wallets.json")).await);
        let wallet = wallets
            .create(
                "shared".into(),
                vec![CurrencyBalance::with_amount(usd(), "US dollar", dec!(0))],
            )
            .await
            .unwrap();

        let engine = Arc::new(TransactionEngine::new(wallets, test_rates()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let id = wallet.id;
            tasks.push(tokio::spawn(async move {
                engine.deposit(id, usd(), dec!(100)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // every deposit observed its predecessor's result: withdrawing the
        // full sum leaves exactly zero
        let final_balance = engine.withdraw(wallet.id, usd(), dec!(800)).await.unwrap();
        assert_eq!(final_balance.amount(), dec!(0));
    }

    #[tokio::test]
    async fn test_operations_on_different_wallets_are_independent() {
        let wallets = Arc::new(MemoryWalletStore::new());
        let first = wallets.create("first".into(), Vec::new()).await.unwrap();
        let second = wallets.create("second".into(), Vec::new()).await.unwrap();

        let engine = TransactionEngine::with_config(
            wallets,
            test_rates(),
            TransactionConfig {
                lock_wait: Duration::from_millis(50),
            },
        );

        // park a guard on the first wallet for the whole test
        let _held = engine
            .locks
            .acquire(first.id, Duration::from_millis(50))
            .await
            .unwrap();

        // the second wallet is not affected by the first one's lock
        engine.deposit(second.id, usd(), dec!(5)).await.unwrap();

        // while the first wallet itself times out
        let blocked = engine.deposit(first.id, usd(), dec!(5)).await;
        assert!(matches!(blocked, Err(WalletError::LockTimeout { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Exchanging away a fixed source amount and then demanding it back
        /// restores the source exactly; the intermediate currency ends
        /// within one rounding unit of where it started, or the buy-back
        /// fails short by less than half a rounding unit.
        #[test]
        fn prop_exchange_round_trip(
            start_cents in 10_000i64..100_000_000,
            spend_pct in 1i64..=100,
            usd_mid_cents in 10i64..50_000,
            eur_mid_cents in 10i64..50_000,
        ) {
            let start = Decimal::new(start_cents, 2);
            let spend = multiwallet_common::round2(start * Decimal::new(spend_pct, 2));
            prop_assume!(spend > Decimal::ZERO);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let wallets = Arc::new(MemoryWalletStore::new());
                let wallet = wallets
                    .create(
                        "prop".into(),
                        vec![CurrencyBalance::with_amount(usd(), "US dollar", start)],
                    )
                    .await
                    .unwrap();
                let rates = Arc::new(MemoryRateStore::new(vec![
                    RateEntry::new(usd(), "US dollar", Decimal::new(usd_mid_cents, 2)),
                    RateEntry::new(eur(), "euro", Decimal::new(eur_mid_cents, 2)),
                ]));
                let engine = TransactionEngine::new(wallets, rates);

                engine
                    .exchange_from(wallet.id, usd(), eur(), spend)
                    .await
                    .unwrap();

                // the exact EUR cost of buying the spent USD back
                let required_eur = spend * Decimal::new(usd_mid_cents, 2)
                    / Decimal::new(eur_mid_cents, 2);

                match engine.exchange_to(wallet.id, eur(), usd(), spend).await {
                    Ok(outcome) => {
                        assert_eq!(outcome.target.amount(), start);
                        assert!(outcome.source.amount().abs() <= dec!(0.01));
                    }
                    Err(WalletError::NotEnoughFunds { available }) => {
                        // only a rounding-induced shortfall is acceptable
                        assert!(required_eur - available <= dec!(0.005));
                    }
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            });
        }
    }
}
