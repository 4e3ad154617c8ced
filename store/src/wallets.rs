//! File-backed wallet store.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use multiwallet_common::{CurrencyBalance, StorageError, Wallet, WalletId};

use crate::atomic::{load_or_init, write_atomic};
use crate::traits::WalletStore;

/// Durable wallet collection backed by a single JSON file.
///
/// The in-memory cache mirrors the file. One mutex serializes every
/// operation around the cache-and-file pair: this is the storage guard that
/// keeps two writers (even for different wallets) from racing on the file.
/// It is distinct from the per-wallet business lock, which serializes the
/// whole read-modify-write sequence of one wallet and lives in the engine.
pub struct FileWalletStore {
    path: PathBuf,
    wallets: Mutex<Vec<Wallet>>,
}

impl FileWalletStore {
    /// Open the store, loading the backing file if it exists.
    ///
    /// A missing file is created empty; an unreadable or corrupt file is
    /// logged and the collection starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let wallets = load_or_init(&path, "wallets").await;
        Self {
            path,
            wallets: Mutex::new(wallets),
        }
    }

    /// Serialize the full collection and atomically replace the backing file.
    async fn persist(&self, wallets: &[Wallet]) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(wallets)?;
        write_atomic(&self.path, &json).await
    }
}

#[async_trait]
impl WalletStore for FileWalletStore {
    async fn create(
        &self,
        name: String,
        balances: Vec<CurrencyBalance>,
    ) -> Result<Wallet, StorageError> {
        let mut cache = self.wallets.lock().await;

        // Ids are the collection length at the time of the call; race-free
        // because every mutating call holds the storage guard.
        let id = WalletId::new(cache.len() as u64);
        let wallet = Wallet::new(id, name, balances);

        let mut next = cache.clone();
        next.push(wallet.clone());

        // Persist first; the cache only swaps once the file holds the new
        // collection.
        self.persist(&next).await?;
        *cache = next;

        debug!(wallet_id = %id, "Wallet persisted");
        Ok(wallet)
    }

    async fn list(&self) -> Result<Vec<Wallet>, StorageError> {
        let cache = self.wallets.lock().await;
        Ok(cache.clone())
    }

    async fn get(&self, id: WalletId) -> Result<Option<Wallet>, StorageError> {
        let cache = self.wallets.lock().await;
        Ok(cache.iter().find(|w| w.id == id).cloned())
    }

    async fn update(&self, wallet: &Wallet) -> Result<(), StorageError> {
        let mut cache = self.wallets.lock().await;

        let mut next = cache.clone();
        let stored = next
            .iter_mut()
            .find(|w| w.id == wallet.id)
            .ok_or(StorageError::WalletMissing(wallet.id))?;
        stored.set_balances(wallet.balances().to_vec());

        self.persist(&next).await?;
        *cache = next;

        debug!(wallet_id = %wallet.id, "Wallet update persisted");
        Ok(())
    }
}
