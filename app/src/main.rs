mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::AppConfig;
use kin_core::app::AppCredentialsProvider;
use kin_core::TransferType;
use ledger::{
    agora::AgoraClient, memory::InMemoryLedger, storage::AccountStore, LedgerAccountService,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kin-demo", about = "Send and observe Kin from this device's account")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print this device's address
    Address,
    /// Print the current balance
    Balance,
    /// Send one payment made of one or more line items
    Send {
        /// Line item as NAME=AMOUNT; repeat for several items
        #[arg(long = "item", required = true)]
        items: Vec<String>,
        /// Destination address, base58 or Stellar strkey
        #[arg(long)]
        to: String,
        #[arg(long = "type", default_value = "spend")]
        transfer_type: TransferType,
    },
    /// Print balance and payment updates, refreshing periodically
    Watch {
        #[arg(long, default_value_t = 60)]
        refresh_secs: u64,
    },
    /// Print the effective configuration
    Config,
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn create_ledger_client(
    cfg: &AppConfig,
    credentials: Arc<dyn AppCredentialsProvider>,
) -> anyhow::Result<Arc<dyn LedgerAccountService>> {
    std::fs::create_dir_all(&cfg.storage_dir)
        .with_context(|| format!("Failed to create {}", cfg.storage_dir.display()))?;
    let store = AccountStore::open(&cfg.storage_dir)?;

    match cfg.ledger.kind.as_str() {
        "agora" => {
            let network = cfg.network();
            tracing::info!(network = network.name, url = %network.base_url, "Using Agora gateway");
            Ok(AgoraClient::new(
                network.base_url,
                network.min_api_version,
                credentials,
                store,
            )?)
        }
        _ => {
            tracing::info!("Using in-memory ledger");
            Ok(InMemoryLedger::new(
                store,
                Decimal::from(cfg.ledger.starting_balance),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default config");
        AppConfig::default()
    });
    match cli.command {
        Command::Config => commands::show_config(&cfg),
        command => {
            let credentials = Arc::new(config::credentials(&cfg));
            let ledger = create_ledger_client(&cfg, credentials.clone())?;
            run(command, &cfg, ledger, credentials.as_ref()).await
        }
    }
}

async fn run(
    command: Command,
    cfg: &AppConfig,
    ledger: Arc<dyn LedgerAccountService>,
    credentials: &dyn AppCredentialsProvider,
) -> anyhow::Result<()> {
    match command {
        Command::Address => commands::address(cfg, ledger, credentials).await,
        Command::Balance => commands::balance(cfg, ledger, credentials).await,
        Command::Send {
            items,
            to,
            transfer_type,
        } => commands::send(cfg, ledger, credentials, &items, &to, transfer_type).await,
        Command::Watch { refresh_secs } => {
            commands::watch(cfg, ledger, credentials, refresh_secs).await
        }
        Command::Config => commands::show_config(cfg),
    }
}
