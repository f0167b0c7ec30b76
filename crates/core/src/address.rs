use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::AccountId;

/// A destination account in one of the two encodings the ledger accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "value", rename_all = "lowercase")]
pub enum Address {
    /// Raw ed25519 key, written as base58.
    Solana([u8; 32]),
    /// Stellar strkey text, kept exactly as the caller supplied it.
    Stellar(String),
}

/// Sniffs the encoding of a user-supplied destination.
///
/// Base58 that decodes to exactly 32 bytes is a Solana-style key; anything
/// else is passed through as Stellar text. This never fails: a destination
/// that is neither is only rejected by the ledger at submission.
pub fn resolve(raw: &str) -> Address {
    if let Some(key) = decode_solana(raw) {
        return Address::Solana(key);
    }

    let address = Address::Stellar(raw.to_string());
    if !address.is_well_formed() {
        tracing::warn!(destination = %raw, "destination is neither base58 nor a Stellar strkey");
    }
    address
}

fn decode_solana(raw: &str) -> Option<[u8; 32]> {
    let bytes = bs58::decode(raw).into_vec().ok()?;
    bytes.try_into().ok()
}

impl Address {
    pub fn encoding(&self) -> &'static str {
        match self {
            Address::Solana(_) => "solana",
            Address::Stellar(_) => "stellar",
        }
    }

    /// Shape check only: Solana keys always pass, Stellar text must be a
    /// checksummed `G...` strkey.
    pub fn is_well_formed(&self) -> bool {
        self.account_id().is_some()
    }

    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Address::Solana(key) => Some(AccountId::from_bytes(*key)),
            Address::Stellar(text) => AccountId::from_stellar(text),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Solana(key) => f.write_str(&bs58::encode(key).into_string()),
            Address::Stellar(text) => f.write_str(text),
        }
    }
}
