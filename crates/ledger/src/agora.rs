use super::{storage::AccountStore, LedgerAccountService, Subscription};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use kin_core::app::AppCredentialsProvider;
use kin_core::models::{from_quarks, AccountId, Balance, Payment, PaymentRequest};
use kin_core::{address, Memo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for a Kin payment gateway.
///
/// Account ids are kept locally in the [`AccountStore`]; everything else is a
/// JSON call. Every request carries the app index and the webhook
/// passthrough credentials as headers.
#[derive(Clone)]
pub struct AgoraClient {
    pub base_url: String,
    pub min_api_version: u32,
    credentials: Arc<dyn AppCredentialsProvider>,
    store: AccountStore,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateAccountResponse {
    account_id: AccountId,
}

/// Account registration, tagged with the app it belongs to.
#[derive(Debug, Serialize)]
struct CreateAccountRequest {
    app_index: u32,
    app_address: String,
    app_name: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    quarks: i64,
    #[serde(default)]
    pending_quarks: i64,
}

#[derive(Debug, Serialize)]
struct InvoiceItemBody {
    title: String,
    quarks: i64,
}

#[derive(Debug, Serialize)]
struct SubmitPaymentBody {
    source: String,
    destination: String,
    destination_encoding: &'static str,
    quarks: i64,
    memo: String,
    invoice_hash: String,
    invoice: Vec<InvoiceItemBody>,
}

#[derive(Debug, Deserialize)]
struct PaymentRecord {
    transaction_id: String,
    source: AccountId,
    destination: String,
    quarks: i64,
    memo: Option<String>,
    timestamp: DateTime<Utc>,
}

impl PaymentRecord {
    fn into_payment(self) -> Payment {
        let memo = self
            .memo
            .and_then(|m| BASE64_STANDARD.decode(m).ok())
            .and_then(|bytes| Memo::from_bytes(&bytes).ok());
        Payment {
            id: self.transaction_id,
            source: self.source,
            destination: address::resolve(&self.destination),
            amount: from_quarks(self.quarks),
            invoice_hash: memo.map(|m| m.invoice_hash()),
            memo,
            timestamp: self.timestamp,
        }
    }
}

impl AgoraClient {
    pub fn new(
        base_url: String,
        min_api_version: u32,
        credentials: Arc<dyn AppCredentialsProvider>,
        store: AccountStore,
    ) -> Result<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            min_api_version,
            credentials,
            store,
            http_client,
        }))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let app = self.credentials.app_info();
        let user = self.credentials.user_credentials();
        self.http_client
            .request(method, format!("{}/v{}/{}", self.base_url, self.min_api_version, path))
            .header("kin-version", self.min_api_version.to_string())
            .header("app-index", app.app_index.to_string())
            .header("app-user-id", user.user)
            .header("app-user-passkey", user.pass)
    }

    fn create_account_body(&self) -> CreateAccountRequest {
        let app = self.credentials.app_info();
        CreateAccountRequest {
            app_index: app.app_index,
            app_address: app.app_address,
            app_name: app.app_name,
        }
    }

    fn submit_body(request: &PaymentRequest, account: &AccountId) -> Result<SubmitPaymentBody> {
        let quarks = request
            .quarks()
            .ok_or_else(|| anyhow!("amount {} is not representable in quarks", request.amount))?;
        let invoice = request
            .invoice
            .items()
            .iter()
            .map(|item| InvoiceItemBody {
                title: item.description().to_string(),
                quarks: kin_core::models::to_quarks(item.amount()).unwrap_or_default(),
            })
            .collect();

        Ok(SubmitPaymentBody {
            source: account.to_base58(),
            destination: request.destination.to_string(),
            destination_encoding: request.destination.encoding(),
            quarks,
            memo: request.memo.to_base64(),
            invoice_hash: request.invoice.hash().to_hex(),
            invoice,
        })
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let resp = builder
            .send()
            .await
            .with_context(|| format!("Failed to send {what} request"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("{what} failed: {} - {}", status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {what} response"))
    }

    async fn fetch_balance(&self, account: &AccountId) -> Result<Balance> {
        let resp: BalanceResponse = self
            .send_json(
                self.request(reqwest::Method::GET, &format!("accounts/{account}/balance")),
                "balance",
            )
            .await?;
        Ok(Balance {
            amount: from_quarks(resp.quarks),
            pending: from_quarks(resp.pending_quarks),
        })
    }

    async fn fetch_payments(&self, account: &AccountId) -> Result<Vec<Payment>> {
        let records: Vec<PaymentRecord> = self
            .send_json(
                self.request(reqwest::Method::GET, &format!("accounts/{account}/payments")),
                "payment history",
            )
            .await?;
        let mut payments: Vec<Payment> =
            records.into_iter().map(PaymentRecord::into_payment).collect();
        payments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(payments)
    }
}

#[async_trait]
impl LedgerAccountService for AgoraClient {
    async fn list_accounts(&self) -> Result<Vec<AccountId>> {
        self.store.accounts()
    }

    async fn create_account(&self) -> Result<AccountId> {
        let body = self.create_account_body();
        let resp: CreateAccountResponse = self
            .send_json(
                self.request(reqwest::Method::POST, "accounts").json(&body),
                "account creation",
            )
            .await?;
        self.store.insert(&resp.account_id)?;

        tracing::info!(account = %resp.account_id, "Account created on gateway");
        Ok(resp.account_id)
    }

    async fn submit_payment(
        &self,
        request: &PaymentRequest,
        account: &AccountId,
    ) -> Result<Payment> {
        let body = Self::submit_body(request, account)?;
        let record: PaymentRecord = self
            .send_json(
                self.request(reqwest::Method::POST, "payments").json(&body),
                "payment submission",
            )
            .await?;

        tracing::info!(
            transaction = %record.transaction_id,
            invoice_hash = %body.invoice_hash,
            "Payment submitted to gateway"
        );
        Ok(record.into_payment())
    }

    fn observe_balance(&self, account: &AccountId) -> Subscription<Balance> {
        let client = self.clone();
        let account = account.clone();
        Subscription::passive("balance", move || {
            let client = client.clone();
            let account = account.clone();
            async move { client.fetch_balance(&account).await }
        })
    }

    fn observe_payments(&self, account: &AccountId) -> Subscription<Vec<Payment>> {
        let client = self.clone();
        let account = account.clone();
        Subscription::passive("payments", move || {
            let client = client.clone();
            let account = account.clone();
            async move { client.fetch_payments(&account).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kin_core::app::{AppInfo, AppUserCredentials, StaticCredentials};
    use kin_core::{invoice, memo, TransferType};
    use rust_decimal::Decimal;

    fn client() -> Arc<AgoraClient> {
        let creds = StaticCredentials {
            info: AppInfo {
                app_index: 165,
                app_address: "GC6D6TCMFYRTQEECH4FPAS2DFUECCF3KTCXOIYE4NEX2NIDAKQNJ32XS".into(),
                app_name: "demo".into(),
            },
            credentials: AppUserCredentials {
                user: "MyUser".into(),
                pass: "MyPass".into(),
            },
        };
        AgoraClient::new(
            "https://gateway.invalid/".into(),
            4,
            Arc::new(creds),
            AccountStore::temporary().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn requests_carry_app_headers() {
        let req = client()
            .request(reqwest::Method::GET, "accounts/x/balance")
            .build()
            .unwrap();
        assert_eq!(req.url().as_str(), "https://gateway.invalid/v4/accounts/x/balance");
        let headers = req.headers();
        assert_eq!(headers["app-index"], "165");
        assert_eq!(headers["app-user-id"], "MyUser");
        assert_eq!(headers["app-user-passkey"], "MyPass");
        assert_eq!(headers["kin-version"], "4");
    }

    #[test]
    fn account_creation_registers_the_app() {
        let body = serde_json::to_value(client().create_account_body()).unwrap();
        assert_eq!(body["app_index"], 165);
        assert_eq!(
            body["app_address"],
            "GC6D6TCMFYRTQEECH4FPAS2DFUECCF3KTCXOIYE4NEX2NIDAKQNJ32XS"
        );
        assert_eq!(body["app_name"], "demo");
    }

    #[test]
    fn submit_body_uses_quarks_and_base64_memo() {
        let inv = invoice::build(&[("Burger", Decimal::new(200, 2)), ("Tip", Decimal::new(50, 2))])
            .unwrap();
        let request = PaymentRequest {
            amount: inv.total(),
            destination: address::resolve("C2Tb36xUjDDiN4H3xE2T7PuBFb1gdCvP7znen1m8FStJ"),
            memo: memo::build(&inv, TransferType::Spend, 165).unwrap(),
            invoice: inv,
        };
        let account = AccountId::from_bytes([5u8; 32]);

        let body = AgoraClient::submit_body(&request, &account).unwrap();
        assert_eq!(body.quarks, 250_000);
        assert_eq!(body.destination_encoding, "solana");
        assert_eq!(body.invoice.len(), 2);
        assert_eq!(body.invoice[1].quarks, 50_000);
        assert_eq!(body.memo, request.memo.to_base64());
        assert_eq!(body.source, account.to_base58());
    }

    #[test]
    fn payment_records_decode_memo_and_amount() {
        let inv = invoice::build(&[("Item", Decimal::ONE)]).unwrap();
        let memo = memo::build(&inv, TransferType::Earn, 9).unwrap();
        let json = serde_json::json!({
            "transaction_id": "abc",
            "source": AccountId::from_bytes([1u8; 32]).to_base58(),
            "destination": AccountId::from_bytes([2u8; 32]).to_stellar(),
            "quarks": 123_456,
            "memo": memo.to_base64(),
            "timestamp": "2024-01-01T00:00:00Z",
        });
        let record: PaymentRecord = serde_json::from_value(json).unwrap();
        let payment = record.into_payment();

        assert_eq!(payment.amount, Decimal::new(123_456, 5));
        assert_eq!(payment.memo, Some(memo));
        assert_eq!(payment.invoice_hash.as_ref(), Some(inv.hash()));
        assert_eq!(payment.destination.encoding(), "stellar");
    }
}
