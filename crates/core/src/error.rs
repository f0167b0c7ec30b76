use thiserror::Error;

use crate::invoice::InvoiceError;
use crate::memo::MemoError;

/// Every way a payment can fail, as seen by the caller of `send`.
///
/// The first four are detected locally before anything reaches the ledger.
/// `Ledger` carries whatever the ledger client reported, untouched.
#[derive(Debug, Error)]
pub enum KinError {
    #[error("cannot send a payment with an empty invoice")]
    EmptyInvoice,

    #[error("line item {index} has an invalid amount: {reason}")]
    InvalidLineItemAmount { index: usize, reason: &'static str },

    /// App index is zero or wider than the memo's 16-bit field.
    #[error("app index {0} is not a positive 16-bit integer")]
    InvalidAppIndex(u32),

    #[error("account session is not ready")]
    AccountNotReady,

    #[error("malformed memo: {0}")]
    MalformedMemo(String),

    #[error("ledger error: {0:#}")]
    Ledger(anyhow::Error),
}

impl From<InvoiceError> for KinError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::Empty => KinError::EmptyInvoice,
            InvoiceError::InvalidAmount { index, reason } => {
                KinError::InvalidLineItemAmount { index, reason }
            }
        }
    }
}

impl From<MemoError> for KinError {
    fn from(err: MemoError) -> Self {
        match err {
            MemoError::InvalidAppIndex(index) => KinError::InvalidAppIndex(index),
            other => KinError::MalformedMemo(other.to_string()),
        }
    }
}
