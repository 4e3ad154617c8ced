//! Wallet and balance models.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::currency::{round2, CurrencyCode};

/// Unique identifier for a wallet.
///
/// Assigned by the wallet store on creation and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(u64);

impl WalletId {
    /// Create a wallet ID from its numeric value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for WalletId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A single currency position inside a wallet.
///
/// The amount is private: every write re-applies the 2-digit
/// half-away-from-zero rounding, including deserialization, so an amount at
/// rest never carries more than two fractional digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    /// Currency code.
    pub code: CurrencyCode,
    /// Currency display name.
    pub name: String,
    #[serde(deserialize_with = "deserialize_rounded")]
    amount: Decimal,
}

impl CurrencyBalance {
    /// Create a zero balance for a currency.
    pub fn new(code: CurrencyCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            amount: Decimal::ZERO,
        }
    }

    /// Create a balance with an initial amount (rounded on construction).
    pub fn with_amount(code: CurrencyCode, name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            code,
            name: name.into(),
            amount: round2(amount),
        }
    }

    /// Current amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Increase the balance. The stored amount is rounded after the add.
    pub fn credit(&mut self, delta: Decimal) {
        self.amount = round2(self.amount + delta);
    }

    /// Decrease the balance. The stored amount is rounded after the subtract.
    ///
    /// Funds checks are the transaction engine's job; this only maintains the
    /// rounding invariant.
    pub fn debit(&mut self, delta: Decimal) {
        self.amount = round2(self.amount - delta);
    }
}

fn deserialize_rounded<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = <Decimal as Deserialize>::deserialize(deserializer)?;
    Ok(round2(raw))
}

/// A named container of per-currency balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet identifier, assigned by the store.
    pub id: WalletId,
    /// Display name.
    pub name: String,
    balances: Vec<CurrencyBalance>,
}

impl Wallet {
    /// Create a wallet. Duplicate currency codes in `balances` are dropped,
    /// keeping the first occurrence; insertion order is preserved.
    pub fn new(id: WalletId, name: impl Into<String>, balances: Vec<CurrencyBalance>) -> Self {
        let mut wallet = Self {
            id,
            name: name.into(),
            balances: Vec::with_capacity(balances.len()),
        };
        for balance in balances {
            if wallet.balance(&balance.code).is_none() {
                wallet.balances.push(balance);
            }
        }
        wallet
    }

    /// All balances in insertion order.
    pub fn balances(&self) -> &[CurrencyBalance] {
        &self.balances
    }

    /// Look up the balance for a currency.
    pub fn balance(&self, code: &CurrencyCode) -> Option<&CurrencyBalance> {
        self.balances.iter().find(|b| b.code == *code)
    }

    /// Mutable lookup of the balance for a currency.
    pub fn balance_mut(&mut self, code: &CurrencyCode) -> Option<&mut CurrencyBalance> {
        self.balances.iter_mut().find(|b| b.code == *code)
    }

    /// Get the balance for a currency, inserting a zero entry if absent.
    ///
    /// Keeps the one-entry-per-code invariant: an existing entry is returned
    /// as-is, a new one is appended at the end.
    pub fn ensure_balance(
        &mut self,
        code: &CurrencyCode,
        name: &str,
    ) -> &mut CurrencyBalance {
        if let Some(idx) = self.balances.iter().position(|b| b.code == *code) {
            return &mut self.balances[idx];
        }
        self.balances
            .push(CurrencyBalance::new(code.clone(), name));
        let last = self.balances.len() - 1;
        &mut self.balances[last]
    }

    /// Replace the whole balance list. Used by the store when applying an
    /// update; id and name are not touched.
    pub fn set_balances(&mut self, balances: Vec<CurrencyBalance>) {
        self.balances = balances;
    }
}
