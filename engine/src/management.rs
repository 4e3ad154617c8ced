//! Wallet creation and read access.

use std::sync::Arc;

use tracing::{info, warn};

use multiwallet_common::{CurrencyBalance, CurrencyCode, Wallet, WalletError, WalletId};
use multiwallet_store::{RateStore, WalletStore};

/// Creates wallets and exposes read access to the collection.
pub struct WalletManager {
    wallets: Arc<dyn WalletStore>,
    rates: Arc<dyn RateStore>,
}

impl WalletManager {
    /// Create a manager over the given stores.
    pub fn new(wallets: Arc<dyn WalletStore>, rates: Arc<dyn RateStore>) -> Self {
        Self { wallets, rates }
    }

    /// Create a wallet, optionally seeded with zero-amount balances.
    ///
    /// Seeding is best effort: a code the rate table does not know, or one
    /// repeated in the request, is skipped with a warning rather than
    /// failing the whole creation.
    pub async fn create_wallet(
        &self,
        name: impl Into<String>,
        currency_codes: &[CurrencyCode],
    ) -> Result<Wallet, WalletError> {
        let mut balances: Vec<CurrencyBalance> = Vec::new();

        for code in currency_codes {
            let Some(entry) = self.rates.lookup(code).await? else {
                warn!(code = %code, "Requested currency has no rate entry, skipping");
                continue;
            };
            if balances.iter().any(|b| b.code == *code) {
                warn!(code = %code, "Requested currency repeated, skipping");
                continue;
            }
            balances.push(CurrencyBalance::new(entry.code, entry.name));
        }

        let wallet = self.wallets.create(name.into(), balances).await?;
        info!(
            wallet_id = %wallet.id,
            currencies = wallet.balances().len(),
            "Wallet created"
        );
        Ok(wallet)
    }

    /// All wallets in creation order.
    pub async fn wallets(&self) -> Result<Vec<Wallet>, WalletError> {
        Ok(self.wallets.list().await?)
    }

    /// A single wallet, or `None` if the id was never assigned.
    pub async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>, WalletError> {
        Ok(self.wallets.get(id).await?)
    }
}
