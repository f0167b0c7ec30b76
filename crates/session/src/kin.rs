use crate::account::AccountSession;
use crate::audit::AuditLog;
use crate::dispatch::{PaymentDispatcher, PendingPayment};
use kin_core::app::AppCredentialsProvider;
use kin_core::models::{Balance, Payment, TransferType};
use kin_core::KinError;
use ledger::{Invalidator, LedgerAccountService, Subscription};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub type BalanceHandler = Box<dyn Fn(Balance) + Send + Sync>;
pub type PaymentsHandler = Box<dyn Fn(Vec<Payment>) + Send + Sync>;

/// Notification callbacks. Observers only run for the handlers that are set.
#[derive(Default)]
pub struct Handlers {
    pub balance_changed: Option<BalanceHandler>,
    pub payment_happened: Option<PaymentsHandler>,
}

impl Handlers {
    pub fn on_balance(mut self, f: impl Fn(Balance) + Send + Sync + 'static) -> Self {
        self.balance_changed = Some(Box::new(f));
        self
    }

    pub fn on_payments(mut self, f: impl Fn(Vec<Payment>) + Send + Sync + 'static) -> Self {
        self.payment_happened = Some(Box::new(f));
        self
    }
}

struct Observer {
    invalidator: Invalidator,
    task: JoinHandle<()>,
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn watch<T: Send + 'static>(
    mut subscription: Subscription<T>,
    handler: Box<dyn Fn(T) + Send + Sync>,
) -> Observer {
    let invalidator = subscription.invalidator();
    let task = tokio::spawn(async move {
        while let Some(value) = subscription.next().await {
            handler(value);
        }
    });
    Observer { invalidator, task }
}

/// The app-facing surface: one device account, its observers, and sending.
pub struct Kin {
    session: AccountSession,
    dispatcher: PaymentDispatcher,
    balance_observer: Option<Observer>,
    payments_observer: Option<Observer>,
}

impl Kin {
    /// Looks up or creates the device account, then starts the observers.
    pub async fn start(
        ledger: Arc<dyn LedgerAccountService>,
        credentials: &dyn AppCredentialsProvider,
        handlers: Handlers,
        audit: AuditLog,
    ) -> Result<Self, KinError> {
        let session = AccountSession::new(ledger);
        let account = session.initialize().await?.clone();
        let dispatcher = PaymentDispatcher::new(credentials.app_info().app_index, audit);

        let balance_observer = handlers
            .balance_changed
            .map(|handler| watch(session.ledger().observe_balance(&account), handler));
        let payments_observer = handlers
            .payment_happened
            .map(|handler| watch(session.ledger().observe_payments(&account), handler));

        Ok(Self {
            session,
            dispatcher,
            balance_observer,
            payments_observer,
        })
    }

    /// The device's address in base58, for receiving payments.
    pub fn address(&self) -> Result<String, KinError> {
        Ok(self.session.account_id()?.to_base58())
    }

    /// Asks both observers to re-read ledger state, picking up payments this
    /// device did not initiate. Results arrive through the handlers.
    pub fn check_transactions(&self) {
        for invalidator in self.invalidators() {
            invalidator.invalidate();
        }
    }

    fn invalidators(&self) -> Vec<Invalidator> {
        [&self.balance_observer, &self.payments_observer]
            .into_iter()
            .flatten()
            .map(|observer| observer.invalidator.clone())
            .collect()
    }

    /// Callback form of [`send`](Self::send).
    pub fn send_kin<F>(
        &self,
        items: &[(String, Decimal)],
        destination: &str,
        transfer_type: TransferType,
        on_complete: F,
    ) where
        F: FnOnce(Result<Payment, KinError>) + Send + 'static,
    {
        let pending = self.send(items, destination, transfer_type);
        tokio::spawn(async move { on_complete(pending.await) });
    }

    /// Sends a payment; once it succeeds both observers refresh, so the
    /// handlers see the new balance and history without `check_transactions`.
    /// Must be called from within a Tokio runtime.
    pub fn send(
        &self,
        items: &[(String, Decimal)],
        destination: &str,
        transfer_type: TransferType,
    ) -> PendingPayment {
        let invalidators = self.invalidators();
        self.dispatcher
            .send(&self.session, items, destination, transfer_type)
            .inspect(move |result| {
                if result.is_ok() {
                    for invalidator in &invalidators {
                        invalidator.invalidate();
                    }
                }
            })
    }

    pub fn session(&self) -> &AccountSession {
        &self.session
    }
}
