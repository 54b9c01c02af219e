//! Domain models for threads, linked accounts and audit entries

mod account;
mod audit;
mod thread;

pub use account::{Account, Provider};
pub use audit::{AuditLevel, AuditLogEntry, NewAuditEntry};
pub use thread::{DueThread, MalformedThread, NewThread, Thread, ThreadStatus};
