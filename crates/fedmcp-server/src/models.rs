//! Persisted records for FedMCP.

pub mod audit_event;
pub mod stored_document;

pub use audit_event::{AuditAction, AuditEvent, AuditEventRow};
pub use stored_document::StoredDocument;
