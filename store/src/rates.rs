//! File-backed currency rate table.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use multiwallet_common::{CurrencyCode, RateEntry, StorageError};

use crate::atomic::{load_or_init, write_atomic};
use crate::traits::RateStore;

/// Durable rate table backed by a single JSON file.
///
/// The table is replaced wholesale on every save with the same
/// write-to-temp-then-rename protocol as the wallet store. Until a table has
/// been loaded or saved, every lookup answers `None`, indistinguishable from
/// an unknown currency.
pub struct FileRateStore {
    path: PathBuf,
    entries: Mutex<Vec<RateEntry>>,
}

impl FileRateStore {
    /// Open the store, loading the backing file if it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_or_init(&path, "rates").await;
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl RateStore for FileRateStore {
    async fn save(&self, entries: Vec<RateEntry>) -> Result<(), StorageError> {
        // The conversion arithmetic divides by these rates; entries that
        // would break the positive-rate invariant are dropped, not stored.
        let mut accepted = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.mid <= Decimal::ZERO {
                warn!(code = %entry.code, mid = %entry.mid, "Dropping non-positive rate");
                continue;
            }
            accepted.push(entry);
        }

        let mut cache = self.entries.lock().await;
        let json = serde_json::to_vec(&accepted)?;
        write_atomic(&self.path, &json).await?;
        debug!(entries = accepted.len(), "Rate table persisted");
        *cache = accepted;
        Ok(())
    }

    async fn lookup(&self, code: &CurrencyCode) -> Result<Option<RateEntry>, StorageError> {
        let cache = self.entries.lock().await;
        Ok(cache.iter().find(|e| e.code == *code).cloned())
    }

    async fn list(&self) -> Result<Vec<RateEntry>, StorageError> {
        let cache = self.entries.lock().await;
        Ok(cache.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn table() -> Vec<RateEntry> {
        vec![
            RateEntry::new(CurrencyCode::new("USD"), "US dollar", dec!(4.05)),
            RateEntry::new(CurrencyCode::new("EUR"), "euro", dec!(4.32)),
        ]
    }

    #[tokio::test]
    async fn test_lookup_before_any_save_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRateStore::open(dir.path().join("rates.json")).await;

        let rate = store.lookup(&CurrencyCode::new("USD")).await.unwrap();
        assert!(rate.is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRateStore::open(dir.path().join("rates.json")).await;

        store.save(table()).await.unwrap();
        store
            .save(vec![RateEntry::new(
                CurrencyCode::new("GBP"),
                "pound sterling",
                dec!(5.11),
            )])
            .await
            .unwrap();

        assert!(store
            .lookup(&CurrencyCode::new("USD"))
            .await
            .unwrap()
            .is_none());
        let gbp = store
            .lookup(&CurrencyCode::new("GBP"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gbp.mid, dec!(5.11));
    }

    #[tokio::test]
    async fn test_save_drops_non_positive_rates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRateStore::open(dir.path().join("rates.json")).await;

        let mut entries = table();
        entries.push(RateEntry::new(CurrencyCode::new("XXX"), "bogus", dec!(0)));
        store.save(entries).await.unwrap();

        assert!(store
            .lookup(&CurrencyCode::new("XXX"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_table_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.json");

        {
            let store = FileRateStore::open(&path).await;
            store.save(table()).await.unwrap();
        }

        let store = FileRateStore::open(&path).await;
        let eur = store
            .lookup(&CurrencyCode::new("EUR"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(eur.mid, dec!(4.32));
        assert_eq!(eur.name, "euro");
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive_via_code_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRateStore::open(dir.path().join("rates.json")).await;
        store.save(table()).await.unwrap();

        let rate = store.lookup(&CurrencyCode::new("usd")).await.unwrap();
        assert!(rate.is_some());
    }
}
