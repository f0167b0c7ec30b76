use anyhow::Result;
use async_trait::async_trait;
use kin_core::models::{AccountId, Balance, Payment, PaymentRequest};

pub use observe::{Invalidator, Subscription};

/// The ledger client the payment pipeline delegates to. Implementations own
/// signing, submission and any retry policy.
#[async_trait]
pub trait LedgerAccountService: Send + Sync {
    /// Accounts already known to this installation, oldest first.
    async fn list_accounts(&self) -> Result<Vec<AccountId>>;
    async fn create_account(&self) -> Result<AccountId>;
    async fn submit_payment(&self, request: &PaymentRequest, account: &AccountId)
        -> Result<Payment>;
    /// Must be called from within a Tokio runtime.
    fn observe_balance(&self, account: &AccountId) -> Subscription<Balance>;
    /// Yields the account's payment history, newest first, whenever it changes.
    fn observe_payments(&self, account: &AccountId) -> Subscription<Vec<Payment>>;
}

pub mod agora;
pub mod memory;
pub mod observe;
pub mod storage;
