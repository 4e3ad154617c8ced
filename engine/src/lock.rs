//! Per-wallet exclusive locks with bounded wait.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::warn;

use multiwallet_common::{WalletError, WalletId};

/// Proof of exclusive access to one wallet.
///
/// The lock is released when the guard drops, so every exit path of the
/// holding scope releases it; there is no manual release call to forget.
#[derive(Debug)]
pub struct WalletLockGuard {
    wallet_id: WalletId,
    _guard: OwnedMutexGuard<()>,
}

impl WalletLockGuard {
    /// The wallet this guard holds.
    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }
}

/// Hands out one exclusive lock per wallet id.
///
/// Lock primitives are created lazily on first reference and never removed:
/// the same mutex must serve a given id for the process lifetime, and
/// removing an apparently idle entry would race with a waiter arriving for
/// it. The map therefore grows with the number of distinct ids ever locked —
/// a known scaling limit, cheap at the wallet counts this store targets.
///
/// No fairness order is promised among waiters for the same wallet.
pub struct WalletLockManager {
    locks: DashMap<WalletId, Arc<Mutex<()>>>,
}

impl WalletLockManager {
    /// Create a lock manager with no locks yet.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `wallet_id`, waiting at most `max_wait`.
    ///
    /// On timeout the caller has performed no reads or writes yet, so the
    /// condition is recoverable and retryable; it is logged as a warning
    /// because it signals contention.
    pub async fn acquire(
        &self,
        wallet_id: WalletId,
        max_wait: Duration,
    ) -> Result<WalletLockGuard, WalletError> {
        let lock = self
            .locks
            .entry(wallet_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        match timeout(max_wait, lock.lock_owned()).await {
            Ok(guard) => Ok(WalletLockGuard {
                wallet_id,
                _guard: guard,
            }),
            Err(_) => {
                warn!(
                    wallet_id = %wallet_id,
                    waited_ms = max_wait.as_millis() as u64,
                    "Wallet lock wait timed out"
                );
                Err(WalletError::LockTimeout { wallet_id, waited: max_wait })
            }
        }
    }

    /// Number of wallet ids that have ever been locked.
    pub fn tracked_wallets(&self) -> usize {
        self.locks.len()
    }
}

impl Default for WalletLockManager {
    fn default() -> Self {
        Self::new()
    }
}
