//! In-memory audit log, for tests and single-process deployments.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{AuditError, AuditLog, AuditQuery};
use crate::models::AuditEvent;

/// Keeps every event in a `Vec` in append order. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn tamper(&self, index: usize, edit: impl FnOnce(&mut AuditEvent)) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut events[index]);
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        Ok(query.apply(events.iter()))
    }

    async fn last(&self) -> Result<Option<AuditEvent>, AuditError> {
        Ok(self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned())
    }

    async fn all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
