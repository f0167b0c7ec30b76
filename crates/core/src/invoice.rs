use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use std::fmt;
use thiserror::Error;

use crate::models::to_quarks;
use crate::validation::{decimal_from_f64, validate_amounts};

/// SHA-224 digest length; also the width of the memo's foreign key payload.
pub const INVOICE_HASH_LEN: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("invoice has no line items")]
    Empty,
    #[error("line item {index}: {reason}")]
    InvalidAmount { index: usize, reason: &'static str },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceHash([u8; INVOICE_HASH_LEN]);

impl InvoiceHash {
    pub fn from_bytes(bytes: [u8; INVOICE_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; INVOICE_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InvoiceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InvoiceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvoiceHash({})", self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    description: String,
    amount: Decimal,
}

impl LineItem {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// An itemized, hashed record of what a payment is for. Only produced by
/// [`build`], so the hash always matches the items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    items: Vec<LineItem>,
    hash: InvoiceHash,
}

impl Invoice {
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn hash(&self) -> &InvoiceHash {
        &self.hash
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(LineItem::amount).sum()
    }
}

/// Builds an invoice from ordered `(description, amount)` pairs.
pub fn build<S: AsRef<str>>(items: &[(S, Decimal)]) -> Result<Invoice, InvoiceError> {
    validate_amounts(items.iter().map(|(_, amount)| *amount))?;

    let items: Vec<LineItem> = items
        .iter()
        .map(|(description, amount)| LineItem {
            description: description.as_ref().to_string(),
            amount: *amount,
        })
        .collect();
    let hash = compute_hash(&items);
    Ok(Invoice { items, hash })
}

/// Same as [`build`] for floating-point prices. Each price is rounded to the
/// nearest quark; NaN and infinities are rejected with the offending index.
pub fn build_from_f64<S: AsRef<str>>(items: &[(S, f64)]) -> Result<Invoice, InvoiceError> {
    let converted = items
        .iter()
        .enumerate()
        .map(|(index, (description, amount))| {
            decimal_from_f64(*amount)
                .map(|amount| (description.as_ref(), amount))
                .map_err(|reason| InvoiceError::InvalidAmount { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;
    build(&converted)
}

/// Exact decimal sum of the amounts.
pub fn total<S>(items: &[(S, Decimal)]) -> Decimal {
    items.iter().map(|(_, amount)| *amount).sum()
}

// Length-prefixed description followed by the amount in quarks, per item.
fn compute_hash(items: &[LineItem]) -> InvoiceHash {
    let mut hasher = Sha224::new();
    for item in items {
        let description = item.description.as_bytes();
        hasher.update((description.len() as u32).to_be_bytes());
        hasher.update(description);
        let quarks = to_quarks(item.amount).unwrap_or_default();
        hasher.update(quarks.to_be_bytes());
    }
    InvoiceHash(hasher.finalize().into())
}
