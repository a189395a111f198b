//! Append-only audit trail.
//!
//! Every event is appended to exactly one [`AuditLog`] (mandatory) and then
//! handed to any number of [`AuditSink`]s (best-effort, in the background).

pub mod chain;
pub mod file;
pub mod memory;
pub mod postgres;
pub mod sink;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{AuditAction, AuditEvent};

pub use file::FileAuditLog;
pub use memory::InMemoryAuditLog;
pub use postgres::PostgresAuditLog;
pub use sink::{TracingSink, WebhookSink};

/// Default number of events returned by a query.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Upper bound on events returned by a single query.
pub const MAX_QUERY_LIMIT: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt audit record: {0}")]
    Corrupt(String),

    #[error("Audit sink '{sink}' failed: {reason}")]
    Delivery { sink: String, reason: String },
}

/// Filter for audit queries. Filters are exact and conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(alias = "artifact_id")]
    pub artifact_id: Option<String>,
    #[serde(alias = "workspace_id")]
    pub workspace_id: Option<String>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(artifact_id) = &self.artifact_id {
            if event.artifact_id.as_deref() != Some(artifact_id.as_str()) {
                return false;
            }
        }
        if let Some(workspace_id) = &self.workspace_id {
            if &event.workspace_id != workspace_id {
                return false;
            }
        }
        true
    }

    /// The requested limit, defaulted and capped.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .min(MAX_QUERY_LIMIT)
    }

    /// Applies this query to events held in append order.
    pub fn apply<'a>(&self, events: impl DoubleEndedIterator<Item = &'a AuditEvent>) -> Vec<AuditEvent> {
        events
            .rev()
            .filter(|event| self.matches(event))
            .take(self.effective_limit())
            .cloned()
            .collect()
    }
}

/// Durable, append-only event store.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError>;

    /// Matching events, most recent first, bounded by the query limit.
    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, AuditError>;

    /// The most recently appended event.
    async fn last(&self) -> Result<Option<AuditEvent>, AuditError>;

    /// Every event in append order.
    async fn all(&self) -> Result<Vec<AuditEvent>, AuditError>;

    fn backend_name(&self) -> &'static str;
}

/// External, best-effort event destination.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError>;

    fn name(&self) -> &str;
}

struct ChainState {
    next_sequence: u64,
    last_hash: Option<String>,
}

/// Records lifecycle actions to a log and fans them out to sinks.
pub struct AuditTrail {
    log: Arc<dyn AuditLog>,
    sinks: Vec<Arc<dyn AuditSink>>,
    hash_chain: bool,
    state: Mutex<ChainState>,
}

impl AuditTrail {
    /// Opens a trail over `log`, resuming sequence and chain from its last
    /// event.
    pub async fn open(
        log: Arc<dyn AuditLog>,
        sinks: Vec<Arc<dyn AuditSink>>,
        hash_chain: bool,
    ) -> Result<Self, AuditError> {
        let last = log.last().await?;
        let state = ChainState {
            next_sequence: last.as_ref().map(|e| e.sequence + 1).unwrap_or(0),
            last_hash: last.and_then(|e| e.hash),
        };

        tracing::info!(
            backend = log.backend_name(),
            sinks = sinks.len(),
            hash_chain,
            next_sequence = state.next_sequence,
            "audit trail opened"
        );

        Ok(Self {
            log,
            sinks,
            hash_chain,
            state: Mutex::new(state),
        })
    }

    /// Appends one event and returns its id.
    ///
    /// The local append must succeed; sink delivery happens afterwards in
    /// spawned tasks and its failures are only logged.
    pub async fn record(
        &self,
        action: AuditAction,
        actor: &str,
        artifact_id: Option<&str>,
        workspace_id: Option<&str>,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Uuid, AuditError> {
        let event = {
            let mut state = self.state.lock().await;
            let mut event = AuditEvent::new(
                state.next_sequence,
                action,
                actor,
                artifact_id,
                workspace_id,
                metadata.unwrap_or_default(),
            );
            if self.hash_chain {
                let prev = state
                    .last_hash
                    .clone()
                    .unwrap_or_else(|| chain::GENESIS_HASH.to_string());
                chain::seal(&mut event, &prev)?;
            }

            self.log.append(&event).await?;

            state.next_sequence += 1;
            if event.hash.is_some() {
                state.last_hash = event.hash.clone();
            }
            event
        };

        tracing::debug!(
            event_id = %event.event_id,
            action = %event.action,
            sequence = event.sequence,
            "audit event recorded"
        );

        self.dispatch(&event);
        Ok(event.event_id)
    }

    fn dispatch(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.deliver(&event).await {
                    tracing::warn!(
                        sink = sink.name(),
                        event_id = %event.event_id,
                        error = %e,
                        "audit sink delivery failed"
                    );
                }
            });
        }
    }

    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, AuditError> {
        self.log.query(query).await
    }

    /// Re-verifies the hash chain over the whole log.
    pub async fn verify_integrity(&self) -> Result<bool, AuditError> {
        let events = self.log.all().await?;
        Ok(chain::verify_chain(&events))
    }

    pub fn hash_chain_enabled(&self) -> bool {
        self.hash_chain
    }
}
