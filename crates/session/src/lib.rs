pub mod account;
pub mod audit;
pub mod dispatch;
pub mod kin;

pub use account::{AccountSession, SessionState};
pub use audit::AuditLog;
pub use dispatch::{PaymentDispatcher, PendingPayment};
pub use kin::{Handlers, Kin};
