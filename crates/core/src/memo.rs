//! Kin binary memo.
//!
//! 32 bytes, little-endian bit order:
//!
//! | bits    | field          |
//! |---------|----------------|
//! | 0..2    | magic (`0b01`) |
//! | 2..5    | version        |
//! | 5..10   | transfer type  |
//! | 10..26  | app index      |
//! | 26..256 | foreign key    |
//!
//! The foreign key carries the 28-byte invoice hash, which leaves the last
//! six bits zero.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::invoice::{Invoice, InvoiceHash, INVOICE_HASH_LEN};
use crate::models::TransferType;

pub const MEMO_LEN: usize = 32;
pub const MEMO_VERSION: u8 = 1;
/// 230 bits, rounded up.
pub const FOREIGN_KEY_LEN: usize = 29;

const MAGIC: u8 = 0x1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError {
    #[error("app index {0} does not fit the memo's 16-bit field")]
    InvalidAppIndex(u32),
    #[error("memo must be {MEMO_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("memo magic bits are {0:#04b}")]
    BadMagic(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Memo([u8; MEMO_LEN]);

/// Derives the transfer memo for `invoice`. Identical arguments always give
/// byte-identical memos.
pub fn build(
    invoice: &Invoice,
    transfer_type: TransferType,
    app_index: u32,
) -> Result<Memo, MemoError> {
    let app_index = u16::try_from(app_index)
        .ok()
        .filter(|index| *index > 0)
        .ok_or(MemoError::InvalidAppIndex(app_index))?;

    Ok(Memo::encode(
        MEMO_VERSION,
        transfer_type.tag(),
        app_index,
        invoice.hash().as_bytes(),
    ))
}

impl Memo {
    fn encode(version: u8, type_tag: u8, app_index: u16, foreign_key: &[u8]) -> Self {
        debug_assert!(foreign_key.len() <= FOREIGN_KEY_LEN);

        let mut m = [0u8; MEMO_LEN];
        m[0] = MAGIC | (version & 0x7) << 2 | (type_tag & 0x7) << 5;
        m[1] = (type_tag & 0x1f) >> 3 | ((app_index & 0x3f) as u8) << 2;
        m[2] = ((app_index & 0x3fc0) >> 6) as u8;
        m[3] = ((app_index & 0xc000) >> 14) as u8;

        if let Some(first) = foreign_key.first() {
            m[3] |= first << 2;
            for i in 4..3 + foreign_key.len() {
                m[i] = foreign_key[i - 4] >> 6 | foreign_key[i - 3] << 2;
            }
            if foreign_key.len() < FOREIGN_KEY_LEN {
                m[foreign_key.len() + 3] = foreign_key[foreign_key.len() - 1] >> 6;
            }
        }
        Memo(m)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemoError> {
        let m: [u8; MEMO_LEN] = bytes
            .try_into()
            .map_err(|_| MemoError::InvalidLength(bytes.len()))?;
        if m[0] & 0x3 != MAGIC {
            return Err(MemoError::BadMagic(m[0] & 0x3));
        }
        Ok(Memo(m))
    }

    pub fn as_bytes(&self) -> &[u8; MEMO_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    pub fn version(&self) -> u8 {
        (self.0[0] >> 2) & 0x7
    }

    pub fn type_tag(&self) -> u8 {
        self.0[0] >> 5 | (self.0[1] & 0x3) << 3
    }

    pub fn transfer_type(&self) -> Option<TransferType> {
        TransferType::from_tag(self.type_tag())
    }

    pub fn app_index(&self) -> u16 {
        (self.0[1] as u16) >> 2 | (self.0[2] as u16) << 6 | ((self.0[3] & 0x3) as u16) << 14
    }

    pub fn foreign_key(&self) -> [u8; FOREIGN_KEY_LEN] {
        let m = &self.0;
        let mut fk = [0u8; FOREIGN_KEY_LEN];
        for i in 0..FOREIGN_KEY_LEN - 1 {
            fk[i] = m[i + 3] >> 2 | (m[i + 4] & 0x3) << 6;
        }
        fk[FOREIGN_KEY_LEN - 1] = m[MEMO_LEN - 1] >> 2;
        fk
    }

    /// The invoice hash carried in the foreign key.
    pub fn invoice_hash(&self) -> InvoiceHash {
        let mut hash = [0u8; INVOICE_HASH_LEN];
        hash.copy_from_slice(&self.foreign_key()[..INVOICE_HASH_LEN]);
        InvoiceHash::from_bytes(hash)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memo({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice;
    use rust_decimal::Decimal;

    fn sample_invoice() -> Invoice {
        invoice::build(&[("Burger", Decimal::new(200, 2)), ("Tip", Decimal::new(50, 2))]).unwrap()
    }

    #[test]
    fn memo_is_deterministic() {
        let inv = sample_invoice();
        let a = build(&inv, TransferType::Spend, 165).unwrap();
        let b = build(&inv, TransferType::Spend, 165).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        let other = build(&inv, TransferType::Earn, 165).unwrap();
        assert_ne!(a.as_bytes(), other.as_bytes());
    }

    #[test]
    fn fields_decode_back() {
        let inv = sample_invoice();
        for (t, index) in [
            (TransferType::Earn, 1u32),
            (TransferType::Spend, 165),
            (TransferType::P2P, u16::MAX as u32),
        ] {
            let memo = build(&inv, t, index).unwrap();
            assert_eq!(memo.as_bytes()[0] & 0x3, 0x1);
            assert_eq!(memo.version(), MEMO_VERSION);
            assert_eq!(memo.transfer_type(), Some(t));
            assert_eq!(memo.app_index() as u32, index);
            assert_eq!(&memo.invoice_hash(), inv.hash());
            assert_eq!(memo.foreign_key()[FOREIGN_KEY_LEN - 1], 0);
        }
    }

    #[test]
    fn header_bytes_match_layout() {
        let inv = sample_invoice();
        let memo = build(&inv, TransferType::Spend, 1).unwrap();
        // magic 1, version 1 << 2, spend (2) << 5
        assert_eq!(memo.as_bytes()[0], 0b0100_0101);
        assert_eq!(memo.as_bytes()[1], 0b0000_0100);
    }

    #[test]
    fn app_index_must_be_positive_and_16_bit() {
        let inv = sample_invoice();
        assert_eq!(
            build(&inv, TransferType::P2P, 0),
            Err(MemoError::InvalidAppIndex(0))
        );
        assert_eq!(
            build(&inv, TransferType::P2P, 65_536),
            Err(MemoError::InvalidAppIndex(65_536))
        );
    }

    #[test]
    fn from_bytes_checks_length_and_magic() {
        let memo = build(&sample_invoice(), TransferType::Spend, 7).unwrap();
        assert_eq!(Memo::from_bytes(memo.as_bytes()), Ok(memo));
        assert_eq!(Memo::from_bytes(&[1u8; 3]), Err(MemoError::InvalidLength(3)));
        assert_eq!(Memo::from_bytes(&[0u8; MEMO_LEN]), Err(MemoError::BadMagic(0)));
        assert_eq!(BASE64_STANDARD.decode(memo.to_base64()).unwrap(), memo.as_bytes());
    }
}
