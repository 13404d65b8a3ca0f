//! Filtering over a ledger's retained entries.

use chrono::{DateTime, Utc};

use super::entry::AuditEntry;

/// Filter for [`AuditLedger::query`](super::AuditLedger::query).
///
/// All set criteria must match. With a `limit`, the most recent matches are
/// kept, still in arrival order.
///
/// # Example
///
/// ```
/// use trust_center::audit::{AuditLedger, AuditQuery, EntryDraft};
///
/// let ledger = AuditLedger::new("charges", 50);
/// ledger.record(EntryDraft::new("createCharge", "ch-1"));
/// ledger.record(EntryDraft::new("deleteCharge", "ch-1"));
/// ledger.record(EntryDraft::new("createCharge", "ch-2"));
///
/// let hits = ledger.query(&AuditQuery::new().subject("ch-1").escalated_only());
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].operation(), "deleteCharge");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    subject_id: Option<String>,
    operation: Option<String>,
    actor: Option<String>,
    escalated_only: bool,
    denied_only: bool,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

impl AuditQuery {
    /// Creates a query matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one subject.
    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Restricts to an exact operation name.
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Restricts to one actor.
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Keeps escalated entries only.
    pub fn escalated_only(mut self) -> Self {
        self.escalated_only = true;
        self
    }

    /// Keeps denial entries only.
    pub fn denied_only(mut self) -> Self {
        self.denied_only = true;
        self
    }

    /// Keeps entries recorded at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Keeps at most the `limit` most recent matches.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `entry` satisfies every criterion.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(subject) = &self.subject_id {
            if entry.subject_id() != subject {
                return false;
            }
        }
        if let Some(operation) = &self.operation {
            if entry.operation() != operation {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if entry.actor() != Some(actor.as_str()) {
                return false;
            }
        }
        if self.escalated_only && !entry.escalate() {
            return false;
        }
        if self.denied_only && !entry.is_denial() {
            return false;
        }
        if let Some(since) = self.since {
            if entry.timestamp() < since {
                return false;
            }
        }
        true
    }

    pub(crate) fn truncate(&self, mut matched: Vec<AuditEntry>) -> Vec<AuditEntry> {
        if let Some(limit) = self.limit {
            let skip = matched.len().saturating_sub(limit);
            matched.drain(..skip);
        }
        matched
    }
}
