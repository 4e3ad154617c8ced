//! NBP exchange-rates table client.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use multiwallet_common::{CurrencyCode, RateEntry};

use crate::source::{RateSource, RateSourceError};

/// Default NBP table-A endpoint. The payload is a one-element array holding
/// the current table.
pub const DEFAULT_TABLE_URL: &str = "https://api.nbp.pl/api/exchangerates/tables/A?format=json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NbpTable {
    table: String,
    no: String,
    effective_date: String,
    rates: Vec<NbpRate>,
}

#[derive(Debug, Deserialize)]
struct NbpRate {
    currency: String,
    code: String,
    mid: Decimal,
}

fn map_table(table: NbpTable) -> Vec<RateEntry> {
    table
        .rates
        .into_iter()
        .map(|r| RateEntry::new(CurrencyCode::new(r.code), r.currency, r.mid))
        .collect()
}

/// HTTP client for the NBP exchange-rates table.
pub struct NbpRateSource {
    client: reqwest::Client,
    table_url: String,
}

impl NbpRateSource {
    /// Create a client against the default NBP endpoint.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_TABLE_URL)
    }

    /// Create a client against a custom endpoint URL.
    pub fn with_url(table_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            table_url: table_url.into(),
        }
    }
}

impl Default for NbpRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for NbpRateSource {
    fn name(&self) -> &str {
        "NBP"
    }

    async fn fetch_rates(&self) -> Result<Vec<RateEntry>, RateSourceError> {
        let response = self
            .client
            .get(&self.table_url)
            .send()
            .await?
            .error_for_status()?;

        let tables: Vec<NbpTable> = response.json().await?;
        let table = tables.into_iter().next().ok_or(RateSourceError::EmptyTable)?;

        // An empty rate list would wipe the stored table on save; treat it
        // the same as a missing table.
        if table.rates.is_empty() {
            return Err(RateSourceError::EmptyTable);
        }

        debug!(
            table = %table.table,
            no = %table.no,
            effective_date = %table.effective_date,
            rates = table.rates.len(),
            "Fetched NBP table"
        );

        Ok(map_table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"[{
        "table": "A",
        "no": "031/A/NBP/2024",
        "effectiveDate": "2024-02-13",
        "rates": [
            {"currency": "dolar amerykański", "code": "USD", "mid": 4.0215},
            {"currency": "euro", "code": "EUR", "mid": 4.3220}
        ]
    }]"#;

    #[test]
    fn test_parse_and_map_nbp_payload() {
        let tables: Vec<NbpTable> = serde_json::from_str(SAMPLE).unwrap();
        let entries = map_table(tables.into_iter().next().unwrap());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, CurrencyCode::new("USD"));
        assert_eq!(entries[0].name, "dolar amerykański");
        assert_eq!(entries[0].mid, dec!(4.0215));
        assert_eq!(entries[1].code, CurrencyCode::new("EUR"));
    }
}
