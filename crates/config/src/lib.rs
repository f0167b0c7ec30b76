use anyhow::{Context, Result};
use kin_core::app::{AppInfo, AppUserCredentials, StaticCredentials};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "kin-demo";
const KEYCHAIN_SERVICE: &str = "org.kin.demo.credentials";

pub const USER_ENV: &str = "KIN_APP_USER";
pub const PASS_ENV: &str = "KIN_APP_PASS";

/// Oldest gateway API the client will talk to.
pub const MIN_API_VERSION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

/// Concrete endpoint settings for one [`Environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub name: &'static str,
    pub base_url: String,
    pub min_api_version: u32,
}

impl Environment {
    pub fn network(self) -> NetworkConfig {
        match self {
            Environment::Test => NetworkConfig {
                name: "testnet",
                base_url: "https://api.agorainfra.dev".to_string(),
                min_api_version: MIN_API_VERSION,
            },
            Environment::Production => NetworkConfig {
                name: "mainnet",
                base_url: "https://api.agorainfra.net".to_string(),
                min_api_version: MIN_API_VERSION,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub app_index: u32,
    pub app_address: String,
    pub app_name: String,
    /// Where the ledger client keeps its account store. Relative paths are
    /// resolved against the working directory.
    pub storage_dir: PathBuf,
    pub audit_log: Option<PathBuf>,
    pub ledger: LedgerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Test,
            app_index: 165,
            app_address: "GC6D6TCMFYRTQEECH4FPAS2DFUECCF3KTCXOIYE4NEX2NIDAKQNJ32XS".to_string(),
            app_name: "Kin Demo".to_string(),
            storage_dir: default_storage_dir(),
            audit_log: Some(PathBuf::from("audit.jsonl")),
            ledger: LedgerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_kind")]
    pub kind: String, // "memory" | "agora"
    /// Overrides the environment's gateway URL.
    pub base_url: Option<String>,
    /// Kin credited to every account of the in-memory ledger.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            kind: default_ledger_kind(),
            base_url: None,
            starting_balance: default_starting_balance(),
        }
    }
}

fn default_ledger_kind() -> String {
    "memory".to_string()
}

fn default_starting_balance() -> u64 {
    10_000
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".kin")
}

impl AppConfig {
    pub fn app_info(&self) -> AppInfo {
        AppInfo {
            app_index: self.app_index,
            app_address: self.app_address.clone(),
            app_name: self.app_name.clone(),
        }
    }

    /// Network settings with the configured URL override applied.
    pub fn network(&self) -> NetworkConfig {
        let mut network = self.environment.network();
        if let Some(url) = &self.ledger.base_url {
            network.base_url = url.clone();
        }
        network
    }
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
}

/// Webhook credentials from the environment, then the OS keychain. Missing
/// values become empty strings; the gateway decides whether that is allowed.
pub fn user_credentials() -> AppUserCredentials {
    let user = std::env::var(USER_ENV)
        .or_else(|_| get_secret("app_user_id"))
        .unwrap_or_default();
    let pass = std::env::var(PASS_ENV)
        .or_else(|_| get_secret("app_user_passkey"))
        .unwrap_or_default();
    if user.is_empty() {
        tracing::debug!("no webhook credentials configured");
    }
    AppUserCredentials { user, pass }
}

pub fn credentials(cfg: &AppConfig) -> StaticCredentials {
    StaticCredentials {
        info: cfg.app_info(),
        credentials: user_credentials(),
    }
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}
