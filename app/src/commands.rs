use anyhow::{anyhow, Context, Result};
use config::AppConfig;
use kin_core::app::AppCredentialsProvider;
use kin_core::{Balance, Payment, TransferType};
use ledger::LedgerAccountService;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use session::{AuditLog, Handlers, Kin};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: String,
    pub source: String,
    pub destination: String,
    pub amount: String,
    pub transfer_type: Option<TransferType>,
    pub invoice_hash: Option<String>,
    pub timestamp: String,
}

impl From<&Payment> for PaymentView {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id.clone(),
            source: p.source.to_base58(),
            destination: p.destination.to_string(),
            amount: p.amount.to_string(),
            transfer_type: p.memo.and_then(|m| m.transfer_type()),
            invoice_hash: p.invoice_hash.map(|h| h.to_hex()),
            timestamp: p.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub environment: String,
    pub network_url: String,
    pub app_index: u32,
    pub app_address: String,
    pub ledger_kind: String,
    pub storage_dir: String,
}

/// Parses `NAME=AMOUNT`. The last `=` splits, so names may contain `=`.
pub fn parse_item(raw: &str) -> Result<(String, Decimal)> {
    let (name, amount) = raw
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("line item must look like NAME=AMOUNT: {raw}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("line item has no name: {raw}"));
    }
    let amount: Decimal = amount
        .trim()
        .parse()
        .with_context(|| format!("invalid amount in line item: {raw}"))?;
    Ok((name.to_string(), amount))
}

fn audit_log(cfg: &AppConfig) -> AuditLog {
    match &cfg.audit_log {
        Some(path) => AuditLog::new(path),
        None => AuditLog::disabled(),
    }
}

async fn start(
    cfg: &AppConfig,
    ledger: Arc<dyn LedgerAccountService>,
    credentials: &dyn AppCredentialsProvider,
    handlers: Handlers,
) -> Result<Kin> {
    Kin::start(ledger, credentials, handlers, audit_log(cfg))
        .await
        .context("Failed to start account session")
}

pub async fn address(
    cfg: &AppConfig,
    ledger: Arc<dyn LedgerAccountService>,
    credentials: &dyn AppCredentialsProvider,
) -> Result<()> {
    let kin = start(cfg, ledger, credentials, Handlers::default()).await?;
    println!("Address: {}", kin.address()?);
    Ok(())
}

pub async fn balance(
    cfg: &AppConfig,
    ledger: Arc<dyn LedgerAccountService>,
    credentials: &dyn AppCredentialsProvider,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Balance>();
    let handlers = Handlers::default().on_balance(move |b| {
        let _ = tx.send(b);
    });
    let _kin = start(cfg, ledger, credentials, handlers).await?;

    let balance = tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .context("Timed out waiting for balance")?
        .ok_or_else(|| anyhow!("balance observer stopped"))?;
    println!("Balance: {} Kin (pending {})", balance.amount, balance.pending);
    Ok(())
}

pub async fn send(
    cfg: &AppConfig,
    ledger: Arc<dyn LedgerAccountService>,
    credentials: &dyn AppCredentialsProvider,
    raw_items: &[String],
    destination: &str,
    transfer_type: TransferType,
) -> Result<()> {
    let items = raw_items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>>>()?;
    let kin = start(cfg, ledger, credentials, Handlers::default()).await?;

    eprintln!("Sending Kin");
    let payment = kin.send(&items, destination, transfer_type).await?;
    tracing::info!(transaction = %payment.id, "sent payment");
    println!("{}", serde_json::to_string_pretty(&PaymentView::from(&payment))?);
    Ok(())
}

pub async fn watch(
    cfg: &AppConfig,
    ledger: Arc<dyn LedgerAccountService>,
    credentials: &dyn AppCredentialsProvider,
    refresh_secs: u64,
) -> Result<()> {
    let handlers = Handlers::default()
        .on_balance(|b| println!("Balance: {} Kin", b.amount))
        .on_payments(|payments| {
            if let Some(last) = payments.first() {
                println!("Last Payment: {}", last.timestamp.to_rfc2822());
            }
        });
    let kin = start(cfg, ledger, credentials, handlers).await?;
    println!("Address: {}", kin.address()?);

    let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::debug!("refreshing balance and payments");
                kin.check_transactions();
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

pub fn show_config(cfg: &AppConfig) -> Result<()> {
    let network = cfg.network();
    let settings = Settings {
        environment: network.name.to_string(),
        network_url: network.base_url,
        app_index: cfg.app_index,
        app_address: cfg.app_address.clone(),
        ledger_kind: cfg.ledger.kind.clone(),
        storage_dir: cfg.storage_dir.display().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
