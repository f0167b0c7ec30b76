use super::{storage::AccountStore, LedgerAccountService, Subscription};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use kin_core::models::{AccountId, Balance, Payment, PaymentRequest};
use kin_core::Address;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A ledger that lives in process memory, for demos and tests.
///
/// Account ids persist through the [`AccountStore`]; balances and history do
/// not, so every known account starts a process with `starting_balance`.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    store: AccountStore,
    starting_balance: Decimal,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<AccountId, Decimal>,
    // newest last
    payments: Vec<Payment>,
}

impl InMemoryLedger {
    pub fn new(store: AccountStore, starting_balance: Decimal) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            store,
            starting_balance,
        })
    }

    /// Credits `amount` to `account`, opening it if needed.
    pub async fn airdrop(&self, account: &AccountId, amount: Decimal) {
        let mut state = self.state.lock().await;
        *state.balances.entry(account.clone()).or_default() += amount;
    }

    async fn balance_of(&self, account: &AccountId) -> Result<Balance> {
        let state = self.state.lock().await;
        let amount = state
            .balances
            .get(account)
            .copied()
            .ok_or_else(|| anyhow!("account not found: {account}"))?;
        Ok(Balance {
            amount,
            pending: Decimal::ZERO,
        })
    }

    async fn history_of(&self, account: &AccountId) -> Vec<Payment> {
        let state = self.state.lock().await;
        state
            .payments
            .iter()
            .rev()
            .filter(|p| {
                &p.source == account || p.destination.account_id().as_ref() == Some(account)
            })
            .cloned()
            .collect()
    }

    fn new_transaction_id() -> String {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        hex::encode(bytes)
    }
}

#[async_trait]
impl LedgerAccountService for InMemoryLedger {
    async fn list_accounts(&self) -> Result<Vec<AccountId>> {
        let accounts = self.store.accounts()?;
        let mut state = self.state.lock().await;
        for account in &accounts {
            state
                .balances
                .entry(account.clone())
                .or_insert(self.starting_balance);
        }
        Ok(accounts)
    }

    async fn create_account(&self) -> Result<AccountId> {
        let account = AccountId::from_bytes(rand::thread_rng().gen());
        self.store.insert(&account)?;
        self.state
            .lock()
            .await
            .balances
            .insert(account.clone(), self.starting_balance);
        tracing::info!(account = %account, "created in-memory account");
        Ok(account)
    }

    async fn submit_payment(
        &self,
        request: &PaymentRequest,
        account: &AccountId,
    ) -> Result<Payment> {
        let destination = match &request.destination {
            Address::Stellar(text) if !request.destination.is_well_formed() => {
                bail!("invalid destination: {text}")
            }
            other => other.account_id().ok_or_else(|| anyhow!("invalid destination"))?,
        };
        if request.amount <= Decimal::ZERO {
            bail!("payment amount must be positive");
        }

        let mut state = self.state.lock().await;
        let available = state
            .balances
            .get(account)
            .copied()
            .ok_or_else(|| anyhow!("source account not found: {account}"))?;
        if available < request.amount {
            bail!("insufficient balance: {available} < {}", request.amount);
        }

        state.balances.insert(account.clone(), available - request.amount);
        if let Some(balance) = state.balances.get_mut(&destination) {
            *balance += request.amount;
        }

        let payment = Payment {
            id: Self::new_transaction_id(),
            source: account.clone(),
            destination: request.destination.clone(),
            amount: request.amount,
            memo: Some(request.memo),
            invoice_hash: Some(*request.invoice.hash()),
            timestamp: Utc::now(),
        };
        state.payments.push(payment.clone());

        tracing::info!(
            transaction = %payment.id,
            destination = %request.destination,
            amount = %request.amount,
            "payment applied"
        );
        Ok(payment)
    }

    fn observe_balance(&self, account: &AccountId) -> Subscription<Balance> {
        let ledger = self.clone();
        let account = account.clone();
        Subscription::passive("balance", move || {
            let ledger = ledger.clone();
            let account = account.clone();
            async move { ledger.balance_of(&account).await }
        })
    }

    fn observe_payments(&self, account: &AccountId) -> Subscription<Vec<Payment>> {
        let ledger = self.clone();
        let account = account.clone();
        Subscription::passive("payments", move || {
            let ledger = ledger.clone();
            let account = account.clone();
            async move { Ok(ledger.history_of(&account).await) }
        })
    }
}
