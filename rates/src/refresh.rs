//! Scheduled rate table refresh.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use multiwallet_common::StorageError;
use multiwallet_store::RateStore;

use crate::source::{RateSource, RateSourceError};

/// A refresh cycle failed at the fetch or the save step.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] RateSourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Configuration for the refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between fetches. NBP publishes table A once per business
    /// day, so a daily poll is enough and self-heals after missed updates.
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Periodically replaces the stored rate table with a fresh fetch.
///
/// A failed cycle leaves the previously stored table in place: a stale
/// table keeps the service answering, an empty one would not.
pub struct RateRefresher {
    source: Arc<dyn RateSource>,
    store: Arc<dyn RateStore>,
    config: RefreshConfig,
}

impl RateRefresher {
    /// Create a refresher with the default daily interval.
    pub fn new(source: Arc<dyn RateSource>, store: Arc<dyn RateStore>) -> Self {
        Self::with_config(source, store, RefreshConfig::default())
    }

    /// Create a refresher with a custom configuration.
    pub fn with_config(
        source: Arc<dyn RateSource>,
        store: Arc<dyn RateStore>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Fetch the table once and replace the stored one. Returns the number
    /// of entries fetched.
    pub async fn refresh_once(&self) -> Result<usize, RefreshError> {
        let entries = self.source.fetch_rates().await?;
        let count = entries.len();
        self.store.save(entries).await?;
        info!(
            source = self.source.name(),
            entries = count,
            "Rate table refreshed"
        );
        Ok(count)
    }

    /// Run the refresh loop forever, one cycle per configured interval.
    pub async fn run(&self) {
        loop {
            if let Err(e) = self.refresh_once().await {
                error!(
                    source = self.source.name(),
                    error = %e,
                    "Rate refresh failed, keeping previous table"
                );
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }
}
