//! MultiWallet Rate Supply
//!
//! External currency rate plumbing: the [`RateSource`] trait, the NBP
//! table-A HTTP client, and the scheduled refresh task that replaces the
//! stored rate table wholesale on a fixed interval.

pub mod nbp;
pub mod refresh;
pub mod source;

pub use nbp::NbpRateSource;
pub use refresh::{RateRefresher, RefreshConfig, RefreshError};
pub use source::{RateSource, RateSourceError};
