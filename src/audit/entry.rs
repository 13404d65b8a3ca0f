//! Audit entry schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::context::SessionTags;

/// Suffix appended to an action name when the gate refuses it.
pub const DENIED_SUFFIX: &str = "_denied";

/// One immutable audit record.
///
/// Entries are built by [`AuditLedger::record`](super::AuditLedger::record)
/// from an [`EntryDraft`]. Fields are read through accessors only; the
/// `escalate` flag is computed once when the entry is appended.
///
/// The serialized form is the export format: `id`, `timestamp`,
/// `operation`, `subjectID`, `subjectKind`, `detail`, `actor`, `role`,
/// `staffID`, `context`, `escalate`, plus the ledger's `domain` and arrival
/// `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: Uuid,
    seq: u64,
    domain: String,
    timestamp: DateTime<Utc>,
    operation: String,
    #[serde(rename = "subjectID")]
    subject_id: String,
    #[serde(rename = "subjectKind")]
    subject_kind: Option<String>,
    detail: String,
    actor: Option<String>,
    role: Option<String>,
    #[serde(rename = "staffID")]
    staff_id: Option<String>,
    #[serde(rename = "context")]
    correlation: Option<String>,
    escalate: bool,
}

impl AuditEntry {
    pub(crate) fn from_draft(
        draft: EntryDraft,
        seq: u64,
        domain: &str,
        timestamp: DateTime<Utc>,
        escalate: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq,
            domain: domain.to_string(),
            timestamp,
            operation: draft.operation,
            subject_id: draft.subject_id,
            subject_kind: draft.subject_kind,
            detail: draft.detail,
            actor: draft.actor,
            role: draft.tags.role().map(str::to_string),
            staff_id: draft.tags.staff_id().map(str::to_string),
            correlation: draft.tags.correlation().map(str::to_string),
            escalate,
        }
    }

    /// Returns the unique entry id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the arrival sequence number within the owning ledger.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns the owning ledger's domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns when the entry was appended.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the subject identifier.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the subject kind, if recorded.
    pub fn subject_kind(&self) -> Option<&str> {
        self.subject_kind.as_deref()
    }

    /// Returns the free-text detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the actor, if any.
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Returns the session role at recording time.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the session staff identifier at recording time.
    pub fn staff_id(&self) -> Option<&str> {
        self.staff_id.as_deref()
    }

    /// Returns the session correlation label at recording time.
    pub fn correlation(&self) -> Option<&str> {
        self.correlation.as_deref()
    }

    /// Returns true if the entry was flagged for elevated review.
    pub fn escalate(&self) -> bool {
        self.escalate
    }

    /// Returns true if the entry records a refused operation.
    pub fn is_denial(&self) -> bool {
        self.operation.ends_with(DENIED_SUFFIX)
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} by {}",
            self.timestamp.to_rfc3339(),
            self.operation,
            self.subject_id,
            self.actor.as_deref().unwrap_or("<none>")
        )?;
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        if self.escalate {
            write!(f, " (escalated)")?;
        }
        Ok(())
    }
}

/// Everything the caller supplies for one audit entry.
///
/// # Example
///
/// ```
/// use trust_center::SessionTags;
/// use trust_center::audit::EntryDraft;
///
/// let draft = EntryDraft::new("refundCharge", "ch-17")
///     .subject_kind("charge")
///     .detail("refunded 1250 cents")
///     .actor(Some("staff-3"))
///     .tags(&SessionTags::new().with_role("manager"));
///
/// assert_eq!(draft.operation(), "refundCharge");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    operation: String,
    subject_id: String,
    subject_kind: Option<String>,
    detail: String,
    actor: Option<String>,
    tags: SessionTags,
    escalate_hint: bool,
}

impl EntryDraft {
    /// Starts a draft for `operation` on `subject_id`.
    pub fn new(operation: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }

    /// Sets the subject kind.
    pub fn subject_kind(mut self, kind: impl Into<String>) -> Self {
        self.subject_kind = Some(kind.into());
        self
    }

    /// Sets the detail text. Stored as-is, without truncation.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Sets the actor.
    pub fn actor<S: Into<String>>(mut self, actor: Option<S>) -> Self {
        self.actor = actor.map(Into::into);
        self
    }

    /// Copies the ambient session tags.
    pub fn tags(mut self, tags: &SessionTags) -> Self {
        self.tags = tags.clone();
        self
    }

    /// Forces escalation regardless of keywords.
    pub fn escalate_hint(mut self, hint: bool) -> Self {
        self.escalate_hint = hint;
        self
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the detail text.
    pub fn detail_text(&self) -> &str {
        &self.detail
    }

    /// Returns the escalation hint.
    pub fn hint(&self) -> bool {
        self.escalate_hint
    }
}
