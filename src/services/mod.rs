//! Service layer for business logic
//!
//! - `link_service`: link operations shared by the HTTP handlers
//! - `audit`: audit event subscribers

pub mod audit;
mod link_service;

pub use audit::{AuditNotifier, AuditSubscriber, FileAudit, HttpAudit};
pub use link_service::*;
