//! Currency rate table entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyCode;

/// One entry of the currency rate table: the mid rate of a currency against
/// the reference currency (PLN).
///
/// The table is replaced wholesale on every fetch; entries are read-only to
/// everything except the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Currency code.
    pub code: CurrencyCode,
    /// Currency display name.
    pub name: String,
    /// Mid rate against the reference currency. Always positive.
    pub mid: Decimal,
}

impl RateEntry {
    /// Create a rate entry.
    pub fn new(code: CurrencyCode, name: impl Into<String>, mid: Decimal) -> Self {
        Self {
            code,
            name: name.into(),
            mid,
        }
    }
}
