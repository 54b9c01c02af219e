//! Database queries, grouped by table

pub mod accounts;
pub mod audit_logs;
pub mod threads;
