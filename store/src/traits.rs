//! Storage traits.
//!
//! These are the seams where alternative backings (e.g. a relational
//! database) would plug in. Every value crossing the boundary is an owned
//! deep copy; callers can never alias store-internal state.

use async_trait::async_trait;

use multiwallet_common::{CurrencyBalance, CurrencyCode, RateEntry, StorageError, Wallet, WalletId};

/// Durable collection of wallets.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Create a wallet, assigning it the next id, and persist the collection.
    /// Returns the stored wallet.
    async fn create(
        &self,
        name: String,
        balances: Vec<CurrencyBalance>,
    ) -> Result<Wallet, StorageError>;

    /// All wallets, in creation order.
    async fn list(&self) -> Result<Vec<Wallet>, StorageError>;

    /// A single wallet by id, or `None` if it does not exist.
    async fn get(&self, id: WalletId) -> Result<Option<Wallet>, StorageError>;

    /// Replace the stored balance list of the wallet with the given id and
    /// persist the collection.
    async fn update(&self, wallet: &Wallet) -> Result<(), StorageError>;
}

/// Durable currency rate table.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Replace the whole table and persist it.
    async fn save(&self, entries: Vec<RateEntry>) -> Result<(), StorageError>;

    /// Rate entry for a currency. An absent or never-loaded table behaves
    /// exactly like an unknown code: `None`, never an error.
    async fn lookup(&self, code: &CurrencyCode) -> Result<Option<RateEntry>, StorageError>;

    /// The whole table in fetch order.
    async fn list(&self) -> Result<Vec<RateEntry>, StorageError>;
}
