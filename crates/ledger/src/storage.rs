use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use kin_core::models::AccountId;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

/// On-disk record of the accounts this installation controls.
///
/// Keys are sled-generated ids, so iteration order is creation order.
#[derive(Clone)]
pub struct AccountStore {
    db: Db,
    accounts: sled::Tree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccount {
    account: AccountId,
    created_at: DateTime<Utc>,
}

impl AccountStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join("accounts");
        let db = sled::open(&path)
            .with_context(|| format!("Failed to open account store at {}", path.display()))?;
        Self::from_db(db)
    }

    /// Store that disappears when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .context("Failed to open temporary account store")?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let accounts = db.open_tree("accounts")?;
        Ok(Self { db, accounts })
    }

    pub fn accounts(&self) -> Result<Vec<AccountId>> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (_k, v) = item?;
            let rec: StoredAccount = serde_json::from_slice(&v)?;
            out.push(rec.account);
        }
        Ok(out)
    }

    /// Records `account`; a no-op if it is already stored.
    pub fn insert(&self, account: &AccountId) -> Result<()> {
        if self.accounts()?.contains(account) {
            return Ok(());
        }
        let key = self.db.generate_id()?.to_be_bytes();
        let rec = StoredAccount {
            account: account.clone(),
            created_at: Utc::now(),
        };
        self.accounts.insert(key, serde_json::to_vec(&rec)?)?;
        self.accounts.flush()?;
        tracing::debug!(account = %account, "account stored");
        Ok(())
    }
}
