//! Payment construction for the Kin demo client.
//!
//! Everything in this crate is synchronous and free of shared state: address
//! resolution, invoice hashing and memo encoding. Submission and observation
//! live behind the `ledger` crate's service trait.

pub mod address;
pub mod app;
pub mod error;
pub mod invoice;
pub mod memo;
pub mod models;
pub mod validation;

pub use address::Address;
pub use error::KinError;
pub use invoice::{Invoice, InvoiceHash, LineItem};
pub use memo::Memo;
pub use models::{AccountId, Balance, Payment, PaymentRequest, TransferType};
