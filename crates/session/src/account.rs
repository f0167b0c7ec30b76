use kin_core::{AccountId, KinError};
use ledger::LedgerAccountService;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// Owns the one ledger account this installation uses.
///
/// The account is written once by [`AccountSession::initialize`] and read
/// only afterwards. Operations that need it fail fast with
/// [`KinError::AccountNotReady`] before then.
pub struct AccountSession {
    ledger: Arc<dyn LedgerAccountService>,
    account: OnceCell<AccountId>,
}

impl AccountSession {
    pub fn new(ledger: Arc<dyn LedgerAccountService>) -> Self {
        Self {
            ledger,
            account: OnceCell::new(),
        }
    }

    /// Uses the first stored account, creating one on first run. Concurrent
    /// callers share a single lookup.
    pub async fn initialize(&self) -> Result<&AccountId, KinError> {
        self.account
            .get_or_try_init(|| async {
                let existing = self.ledger.list_accounts().await?;
                match existing.into_iter().next() {
                    Some(account) => {
                        tracing::info!(account = %account, "using existing account");
                        Ok(account)
                    }
                    None => {
                        let account = self.ledger.create_account().await?;
                        tracing::info!(account = %account, "created account for this device");
                        Ok(account)
                    }
                }
            })
            .await
            .map_err(KinError::Ledger)
    }

    pub fn state(&self) -> SessionState {
        if self.account.initialized() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        }
    }

    pub fn account_id(&self) -> Result<&AccountId, KinError> {
        self.account.get().ok_or(KinError::AccountNotReady)
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerAccountService> {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{memory::InMemoryLedger, storage::AccountStore};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn first_run_creates_then_reuses() {
        let store = AccountStore::temporary().unwrap();
        let ledger = InMemoryLedger::new(store.clone(), Decimal::ZERO);

        let session = AccountSession::new(ledger.clone());
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(matches!(session.account_id(), Err(KinError::AccountNotReady)));

        let created = session.initialize().await.unwrap().clone();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.account_id().unwrap(), &created);

        let second = AccountSession::new(ledger);
        assert_eq!(second.initialize().await.unwrap(), &created);
        assert_eq!(store.accounts().unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let ledger = InMemoryLedger::new(AccountStore::temporary().unwrap(), Decimal::ZERO);
        let session = AccountSession::new(ledger);
        let (a, b) = tokio::join!(session.initialize(), session.initialize());
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
