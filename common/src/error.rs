//! Error taxonomy for wallet operations.

use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::currency::CurrencyCode;
use crate::wallet::WalletId;

/// Failure while reading or writing a durable store.
///
/// Unlike the business-rule variants of [`WalletError`], these are unexpected
/// conditions: they are logged at error severity and surfaced to the caller.
/// A store that reports one guarantees its in-memory cache still matches the
/// last successful on-disk write.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O failure on the backing file or its temporary sibling.
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collection could not be serialized.
    #[error("serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An update referenced a wallet id the store has never assigned.
    #[error("wallet {0} missing from store during update")]
    WalletMissing(WalletId),
}

impl StorageError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Main error type for wallet operations.
///
/// The first four variants are expected, recoverable business outcomes and
/// must never be logged at error severity. `LockTimeout` is recoverable but
/// logged as a warning (contention signal). `Storage` is unexpected.
#[derive(Debug, Error)]
pub enum WalletError {
    /// No wallet with the given id exists.
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    /// The rate table has no entry for the currency.
    #[error("currency {0} not found in the rate table")]
    CurrencyNotFound(CurrencyCode),

    /// The currency exists in the rate table but the wallet holds no balance
    /// entry for it.
    #[error("currency {0} not present in the wallet")]
    CurrencyNotInWallet(CurrencyCode),

    /// The requested amount exceeds the available balance.
    #[error("not enough funds: available {available}")]
    NotEnoughFunds {
        /// Balance at the time of the check, for caller display.
        available: Decimal,
    },

    /// The per-wallet lock could not be acquired within the wait window.
    #[error("timed out after {waited:?} waiting for the lock on wallet {wallet_id}")]
    LockTimeout {
        wallet_id: WalletId,
        waited: Duration,
    },

    /// Persistence failed while applying the operation.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WalletError {
    /// Whether this is an expected business-rule outcome (as opposed to a
    /// contention or storage failure).
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            WalletError::WalletNotFound(_)
                | WalletError::CurrencyNotFound(_)
                | WalletError::CurrencyNotInWallet(_)
                | WalletError::NotEnoughFunds { .. }
        )
    }
}
