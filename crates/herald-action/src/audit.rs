//! Developer audit trail for load warnings, denials and invocation results.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_core::{CorrelationId, UserId};

use crate::debug::elapsed_ms;
use crate::descriptor::ActionKind;
use crate::guard::GuardReason;
use crate::loader::LoadWarning;

/// One audit entry.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditRecord {
    LoadWarning(LoadWarning),
    GuardDenied {
        correlation_id: CorrelationId,
        kind: ActionKind,
        action_id: String,
        actor: Option<UserId>,
        reason: GuardReason,
    },
    InvocationSucceeded {
        correlation_id: CorrelationId,
        kind: ActionKind,
        action_id: String,
        elapsed: Duration,
    },
    InvocationFailed {
        correlation_id: CorrelationId,
        kind: ActionKind,
        action_id: String,
        error: String,
        elapsed: Duration,
    },
}

impl AuditRecord {
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            AuditRecord::LoadWarning(_) => None,
            AuditRecord::GuardDenied { correlation_id, .. }
            | AuditRecord::InvocationSucceeded { correlation_id, .. }
            | AuditRecord::InvocationFailed { correlation_id, .. } => Some(*correlation_id),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AuditRecord::InvocationFailed { .. })
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Emits each record as a structured log event.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        match record {
            AuditRecord::LoadWarning(warning) => {
                tracing::warn!(target: "herald::audit", "{}", warning);
            }
            AuditRecord::GuardDenied {
                correlation_id,
                kind,
                action_id,
                actor,
                reason,
            } => {
                tracing::info!(
                    target: "herald::audit",
                    %correlation_id,
                    %kind,
                    action = %action_id,
                    actor = ?actor.map(|a| a.0),
                    %reason,
                    "Action denied"
                );
            }
            AuditRecord::InvocationSucceeded {
                correlation_id,
                kind,
                action_id,
                elapsed,
            } => {
                tracing::debug!(
                    target: "herald::audit",
                    %correlation_id,
                    %kind,
                    action = %action_id,
                    elapsed_ms = elapsed_ms(elapsed),
                    "Action completed"
                );
            }
            AuditRecord::InvocationFailed {
                correlation_id,
                kind,
                action_id,
                error,
                elapsed,
            } => {
                tracing::error!(
                    target: "herald::audit",
                    %correlation_id,
                    %kind,
                    action = %action_id,
                    elapsed_ms = elapsed_ms(elapsed),
                    %error,
                    "Action failed"
                );
            }
        }
    }
}

/// A record with the time it was received.
#[derive(Debug, Clone)]
pub struct TimedRecord {
    pub at: DateTime<Utc>,
    pub record: AuditRecord,
}

/// Keeps records in memory, optionally forwarding to another sink.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<TimedRecord>>,
    forward: Option<Box<dyn AuditSink>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also pass every record on to `sink`.
    pub fn forwarding(sink: impl AuditSink + 'static) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            forward: Some(Box::new(sink)),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.timed().into_iter().map(|t| t.record).collect()
    }

    pub fn timed(&self) -> Vec<TimedRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<AuditRecord> {
        self.records().into_iter().filter(|r| r.is_failure()).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        if let Some(forward) = &self.forward {
            forward.record(record.clone());
        }
        if let Ok(mut records) = self.records.lock() {
            records.push(TimedRecord {
                at: Utc::now(),
                record,
            });
        }
    }
}
