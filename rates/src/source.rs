//! Rate source trait and test double.

use async_trait::async_trait;
use thiserror::Error;

use multiwallet_common::RateEntry;

/// Errors from fetching a rate table.
#[derive(Debug, Error)]
pub enum RateSourceError {
    /// The HTTP request failed or the payload could not be decoded.
    #[error("rate source request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The source answered with no usable table.
    #[error("rate source returned an empty table")]
    EmptyTable,
}

/// Supplier of the full currency rate table.
///
/// A fetch returns the whole table; the caller replaces the stored table
/// wholesale. The core never talks to a source directly — it only reads
/// what the refresher has saved.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Source name, for logging.
    fn name(&self) -> &str;

    /// Fetch the current table.
    async fn fetch_rates(&self) -> Result<Vec<RateEntry>, RateSourceError>;
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    entries: std::sync::Mutex<Vec<RateEntry>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a mock source with an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: std::sync::Mutex::new(Vec::new()),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Replace the table the next fetch returns.
    pub fn set_rates(&self, entries: Vec<RateEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    /// Make subsequent fetches fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self) -> Result<Vec<RateEntry>, RateSourceError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RateSourceError::EmptyTable);
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}
