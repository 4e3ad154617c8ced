//! MultiWallet Common Types
//!
//! This crate contains shared types used across the MultiWallet service,
//! including currency codes, wallet and balance models, rate table entries,
//! and the error taxonomy.

pub mod currency;
pub mod error;
pub mod rates;
pub mod wallet;

pub use currency::*;
pub use error::*;
pub use rates::*;
pub use wallet::*;
