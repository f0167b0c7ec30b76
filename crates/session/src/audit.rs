use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// One line of the payment audit trail. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: String,
    pub send_id: String,
    pub invoice_hash: Option<String>,
    pub transaction_id: Option<String>,
    pub destination: Option<String>,
    pub amount: Option<String>,
    pub transfer_type: Option<String>,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: &str, send_id: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            send_id: send_id.to_string(),
            invoice_hash: None,
            transaction_id: None,
            destination: None,
            amount: None,
            transfer_type: None,
            error: None,
        }
    }

    pub fn with_hash(mut self, hash: String) -> Self {
        self.invoice_hash = Some(hash);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: String) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_transfer(
        mut self,
        destination: String,
        amount: String,
        transfer_type: String,
    ) -> Self {
        self.destination = Some(destination);
        self.amount = Some(amount);
        self.transfer_type = Some(transfer_type);
        self
    }
}

/// Append-only JSONL file of dispatch events; disabled when no path is set.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Write failures are logged and otherwise ignored.
    pub fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(
                error = %e,
                event_type = %event.event_type,
                "failed to write audit event"
            );
        }
    }

    fn write(&self, event: &AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        tracing::debug!(
            event_type = %event.event_type,
            send_id = %event.send_id,
            "Audit event written"
        );
        Ok(())
    }
}
