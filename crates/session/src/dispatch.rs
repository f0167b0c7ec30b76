use crate::account::AccountSession;
use crate::audit::{AuditEvent, AuditLog};
use kin_core::models::{Payment, PaymentRequest, TransferType};
use kin_core::{address, invoice, memo, KinError};
use rust_decimal::Decimal;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outcome of one `send`, resolved exactly once.
pub struct PendingPayment {
    rx: oneshot::Receiver<Result<Payment, KinError>>,
}

impl Future for PendingPayment {
    type Output = Result<Payment, KinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(KinError::Ledger(anyhow::anyhow!(
                    "payment task stopped before reporting"
                )))
            })
        })
    }
}

impl PendingPayment {
    fn ready(result: Result<Payment, KinError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Runs `f` on the outcome before it is handed to the caller.
    pub(crate) fn inspect<F>(self, f: F) -> Self
    where
        F: FnOnce(&Result<Payment, KinError>) + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = self.await;
            f(&result);
            let _ = tx.send(result);
        });
        Self { rx }
    }
}

/// Turns line items and a destination into a submitted payment.
#[derive(Clone)]
pub struct PaymentDispatcher {
    app_index: u32,
    audit: AuditLog,
}

impl PaymentDispatcher {
    pub fn new(app_index: u32, audit: AuditLog) -> Self {
        Self { app_index, audit }
    }

    /// Resolves, builds and validates everything the ledger needs. Pure; no
    /// ledger interaction.
    pub fn prepare<S: AsRef<str>>(
        &self,
        items: &[(S, Decimal)],
        destination: &str,
        transfer_type: TransferType,
    ) -> Result<PaymentRequest, KinError> {
        let destination = address::resolve(destination);
        let invoice = invoice::build(items)?;
        let amount = invoice.total();
        let memo = memo::build(&invoice, transfer_type, self.app_index)?;
        Ok(PaymentRequest {
            amount,
            destination,
            memo,
            invoice,
        })
    }

    /// Submits a payment from the session's account. Invalid input resolves
    /// the returned future immediately without touching the ledger. Sends are
    /// independent; no ordering holds between concurrent calls.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send<S: AsRef<str>>(
        &self,
        session: &AccountSession,
        items: &[(S, Decimal)],
        destination: &str,
        transfer_type: TransferType,
    ) -> PendingPayment {
        let send_id = Uuid::new_v4().to_string();

        let prepared = session
            .account_id()
            .cloned()
            .and_then(|account| Ok((account, self.prepare(items, destination, transfer_type)?)));
        let (account, request) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(%send_id, error = %err, "payment rejected before submission");
                self.audit.record(
                    &AuditEvent::new("payment_rejected", &send_id).with_error(err.to_string()),
                );
                return PendingPayment::ready(Err(err));
            }
        };

        let hash = request.invoice.hash().to_hex();
        tracing::info!(
            %send_id,
            invoice_hash = %hash,
            destination = %request.destination,
            amount = %request.amount,
            %transfer_type,
            "submitting payment"
        );
        self.audit.record(
            &AuditEvent::new("payment_requested", &send_id)
                .with_hash(hash.clone())
                .with_transfer(
                    request.destination.to_string(),
                    request.amount.to_string(),
                    transfer_type.to_string(),
                ),
        );

        let (tx, rx) = oneshot::channel();
        let ledger = Arc::clone(session.ledger());
        let audit = self.audit.clone();
        tokio::spawn(async move {
            let result = ledger
                .submit_payment(&request, &account)
                .await
                .map_err(KinError::Ledger);

            match &result {
                Ok(payment) => {
                    tracing::info!(%send_id, transaction = %payment.id, "payment submitted");
                    audit.record(
                        &AuditEvent::new("payment_submitted", &send_id)
                            .with_hash(hash)
                            .with_transaction_id(payment.id.clone()),
                    );
                }
                Err(err) => {
                    tracing::error!(%send_id, error = %err, "payment failed");
                    audit.record(
                        &AuditEvent::new("payment_failed", &send_id)
                            .with_hash(hash)
                            .with_error(err.to_string()),
                    );
                }
            }
            let _ = tx.send(result);
        });

        PendingPayment { rx }
    }

    /// Callback form of [`send`](Self::send); `on_complete` runs exactly once.
    /// Must be called from within a Tokio runtime.
    pub fn send_with<S, F>(
        &self,
        session: &AccountSession,
        items: &[(S, Decimal)],
        destination: &str,
        transfer_type: TransferType,
        on_complete: F,
    ) where
        S: AsRef<str>,
        F: FnOnce(Result<Payment, KinError>) + Send + 'static,
    {
        let pending = self.send(session, items, destination, transfer_type);
        tokio::spawn(async move { on_complete(pending.await) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::Utc;
    use kin_core::{AccountId, Balance};
    use ledger::{LedgerAccountService, Subscription};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records submissions; destinations containing "slow" are delayed and
    /// destinations containing "reject" fail.
    #[derive(Default)]
    struct RecordingLedger {
        submitted: Mutex<Vec<PaymentRequest>>,
    }

    #[async_trait]
    impl LedgerAccountService for RecordingLedger {
        async fn list_accounts(&self) -> anyhow::Result<Vec<AccountId>> {
            Ok(vec![AccountId::from_bytes([1u8; 32])])
        }

        async fn create_account(&self) -> anyhow::Result<AccountId> {
            bail!("not used")
        }

        async fn submit_payment(
            &self,
            request: &PaymentRequest,
            account: &AccountId,
        ) -> anyhow::Result<Payment> {
            self.submitted.lock().unwrap().push(request.clone());
            let destination = request.destination.to_string();
            if destination.contains("slow") {
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            if destination.contains("reject") {
                bail!("transaction rejected: bad destination");
            }
            Ok(Payment {
                id: format!("tx-{destination}"),
                source: account.clone(),
                destination: request.destination.clone(),
                amount: request.amount,
                memo: Some(request.memo),
                invoice_hash: Some(*request.invoice.hash()),
                timestamp: Utc::now(),
            })
        }

        fn observe_balance(&self, _account: &AccountId) -> Subscription<Balance> {
            Subscription::passive("balance", || async {
                Ok(Balance {
                    amount: Decimal::ZERO,
                    pending: Decimal::ZERO,
                })
            })
        }

        fn observe_payments(&self, _account: &AccountId) -> Subscription<Vec<Payment>> {
            Subscription::passive("payments", || async { Ok(Vec::new()) })
        }
    }

    async fn ready_session(ledger: Arc<RecordingLedger>) -> AccountSession {
        let session = AccountSession::new(ledger);
        session.initialize().await.unwrap();
        session
    }

    fn burger_and_tip() -> Vec<(String, Decimal)> {
        vec![
            ("Burger".to_string(), Decimal::new(200, 2)),
            ("Tip".to_string(), Decimal::new(50, 2)),
        ]
    }

    #[tokio::test]
    async fn spend_scenario_submits_once_with_derived_values() {
        let ledger = Arc::new(RecordingLedger::default());
        let session = ready_session(ledger.clone()).await;
        let dispatcher = PaymentDispatcher::new(165, AuditLog::disabled());
        let destination = bs58_key(4);

        let payment = dispatcher
            .send(&session, &burger_and_tip(), &destination, TransferType::Spend)
            .await
            .unwrap();

        let submitted = ledger.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let request = &submitted[0];
        assert_eq!(request.amount, Decimal::new(25, 1));
        assert_eq!(request.destination, kin_core::Address::Solana([4u8; 32]));
        assert_eq!(request.memo.transfer_type(), Some(TransferType::Spend));
        assert_eq!(request.memo.app_index(), 165);
        assert_eq!(&request.memo.invoice_hash(), request.invoice.hash());
        assert_eq!(payment.invoice_hash.as_ref(), Some(request.invoice.hash()));
    }

    #[tokio::test]
    async fn empty_items_fail_without_submitting() {
        let ledger = Arc::new(RecordingLedger::default());
        let session = ready_session(ledger.clone()).await;
        let dispatcher = PaymentDispatcher::new(165, AuditLog::disabled());
        let items: Vec<(String, Decimal)> = Vec::new();

        let result = dispatcher
            .send(&session, &items, &bs58_key(4), TransferType::Spend)
            .await;
        assert!(matches!(result, Err(KinError::EmptyInvoice)));
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_amount_and_app_index_short_circuit() {
        let ledger = Arc::new(RecordingLedger::default());
        let session = ready_session(ledger.clone()).await;

        let items = vec![("ok", Decimal::ONE), ("bad", Decimal::new(-5, 1))];
        let result = PaymentDispatcher::new(165, AuditLog::disabled())
            .send(&session, &items, "anything", TransferType::Earn)
            .await;
        assert!(matches!(
            result,
            Err(KinError::InvalidLineItemAmount { index: 1, .. })
        ));

        let result = PaymentDispatcher::new(0, AuditLog::disabled())
            .send(&session, &burger_and_tip(), "anything", TransferType::Earn)
            .await;
        assert!(matches!(result, Err(KinError::InvalidAppIndex(0))));
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_before_ready_fails_fast() {
        let ledger = Arc::new(RecordingLedger::default());
        let session = AccountSession::new(ledger.clone());
        let result = PaymentDispatcher::new(165, AuditLog::disabled())
            .send(&session, &burger_and_tip(), &bs58_key(4), TransferType::P2P)
            .await;
        assert!(matches!(result, Err(KinError::AccountNotReady)));
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ledger_errors_are_passed_through() {
        let ledger = Arc::new(RecordingLedger::default());
        let session = ready_session(ledger.clone()).await;
        let result = PaymentDispatcher::new(165, AuditLog::disabled())
            .send(&session, &burger_and_tip(), "reject-me", TransferType::P2P)
            .await;
        match result {
            Err(KinError::Ledger(e)) => assert!(e.to_string().contains("transaction rejected")),
            other => panic!("expected ledger error, got {other:?}"),
        }
        assert_eq!(ledger.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_sends_complete_independently() {
        let ledger = Arc::new(RecordingLedger::default());
        let session = ready_session(ledger.clone()).await;
        let dispatcher = PaymentDispatcher::new(165, AuditLog::disabled());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for destination in ["slow-friend", "reject-fast"] {
            let tx = tx.clone();
            dispatcher.send_with(
                &session,
                &burger_and_tip(),
                destination,
                TransferType::P2P,
                move |result| {
                    let _ = tx.send((destination, result));
                },
            );
        }
        drop(tx);

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        // each callback fired once; the fast failure finished first
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "reject-fast");
        assert!(matches!(outcomes[0].1, Err(KinError::Ledger(_))));
        assert_eq!(outcomes[1].0, "slow-friend");
        assert_eq!(outcomes[1].1.as_ref().unwrap().id, "tx-slow-friend");
    }

    #[tokio::test]
    async fn audit_trail_records_requested_and_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let ledger = Arc::new(RecordingLedger::default());
        let session = ready_session(ledger).await;

        PaymentDispatcher::new(165, AuditLog::new(&path))
            .send(&session, &burger_and_tip(), &bs58_key(4), TransferType::Spend)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let kinds: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<AuditEvent>(l).unwrap().event_type)
            .collect();
        assert_eq!(kinds, vec!["payment_requested", "payment_submitted"]);
    }

    fn bs58_key(byte: u8) -> String {
        bs58::encode([byte; 32]).into_string()
    }
}
