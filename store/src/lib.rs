//! MultiWallet Durable Stores
//!
//! File-backed stores for the wallet collection and the currency rate table.
//! Both stores keep an in-memory cache mirroring one JSON file and persist
//! every mutation with a write-to-temp-then-atomic-rename protocol, so a
//! reader never observes a partially written file and a failed write leaves
//! the previous contents intact.

mod atomic;
pub mod rates;
pub mod traits;
pub mod wallets;

pub use rates::FileRateStore;
pub use traits::{RateStore, WalletStore};
pub use wallets::FileWalletStore;
