use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::invoice::{Invoice, InvoiceHash};
use crate::memo::Memo;

/// Fractional digits a Kin amount can carry.
pub const KIN_SCALE: u32 = 5;
pub const QUARKS_PER_KIN: i64 = 100_000;

/// Converts a Kin amount to quarks. `None` when the amount has sub-quark
/// precision or does not fit an `i64`.
pub fn to_quarks(amount: Decimal) -> Option<i64> {
    let scaled = amount.checked_mul(Decimal::from(QUARKS_PER_KIN))?;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

pub fn from_quarks(quarks: i64) -> Decimal {
    Decimal::new(quarks, KIN_SCALE).normalize()
}

/// Economic direction of a payment, embedded in the memo for bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Earn,
    Spend,
    P2P,
}

impl TransferType {
    pub fn tag(self) -> u8 {
        match self {
            TransferType::Earn => 1,
            TransferType::Spend => 2,
            TransferType::P2P => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(TransferType::Earn),
            2 => Some(TransferType::Spend),
            3 => Some(TransferType::P2P),
            _ => None,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferType::Earn => "earn",
            TransferType::Spend => "spend",
            TransferType::P2P => "p2p",
        };
        f.write_str(name)
    }
}

impl FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earn" => Ok(TransferType::Earn),
            "spend" => Ok(TransferType::Spend),
            "p2p" => Ok(TransferType::P2P),
            other => Err(format!("unknown transfer type: {other}")),
        }
    }
}

/// Ed25519 public key identifying a ledger account.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId([u8; 32]);

impl AccountId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Stellar strkey form (`G...`).
    pub fn to_stellar(&self) -> String {
        stellar_strkey::ed25519::PublicKey(self.0).to_string()
    }

    pub fn from_base58(s: &str) -> Option<Self> {
        let bytes = bs58::decode(s).into_vec().ok()?;
        let key: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(key))
    }

    pub fn from_stellar(s: &str) -> Option<Self> {
        stellar_strkey::ed25519::PublicKey::from_string(s)
            .ok()
            .map(|pk| Self(pk.0))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_base58())
    }
}

impl TryFrom<String> for AccountId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        AccountId::from_base58(&s)
            .or_else(|| AccountId::from_stellar(&s))
            .ok_or_else(|| format!("invalid account id: {s}"))
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_base58()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: Decimal,
    pub pending: Decimal,
}

/// A completed transfer as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub source: AccountId,
    pub destination: Address,
    pub amount: Decimal,
    pub memo: Option<Memo>,
    pub invoice_hash: Option<InvoiceHash>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the ledger client needs to sign and submit one transfer.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub destination: Address,
    pub memo: Memo,
    pub invoice: Invoice,
}

impl PaymentRequest {
    pub fn quarks(&self) -> Option<i64> {
        to_quarks(self.amount)
    }
}
