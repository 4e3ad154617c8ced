//! MultiWallet Engine
//!
//! The wallet concurrency core: a per-wallet exclusive lock manager with
//! bounded wait, the transaction engine that applies balance mutations under
//! that lock, and wallet creation with the best-effort currency skip policy.

pub mod lock;
pub mod management;
pub mod transactions;

pub use lock::{WalletLockGuard, WalletLockManager};
pub use management::WalletManager;
pub use transactions::{ExchangeOutcome, TransactionConfig, TransactionEngine};
