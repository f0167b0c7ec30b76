use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the app as registered with the Kin Foundation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_index: u32,
    /// The app's own ledger address (Stellar strkey).
    pub app_address: String,
    pub app_name: String,
}

/// Credentials forwarded to the app's webhook. Opaque to this crate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AppUserCredentials {
    pub user: String,
    pub pass: String,
}

impl fmt::Debug for AppUserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUserCredentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

pub trait AppCredentialsProvider: Send + Sync {
    fn app_info(&self) -> AppInfo;
    fn user_credentials(&self) -> AppUserCredentials;
}

/// Provider backed by values fixed at startup.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub info: AppInfo,
    pub credentials: AppUserCredentials,
}

impl AppCredentialsProvider for StaticCredentials {
    fn app_info(&self) -> AppInfo {
        self.info.clone()
    }

    fn user_credentials(&self) -> AppUserCredentials {
        self.credentials.clone()
    }
}
