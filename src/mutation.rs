//! Permission-gated, audited mutation of a single entity.
//!
//! [`GuardedMutation`] runs one named operation through the fixed protocol:
//!
//! ```text
//! precondition ──no-op──▶ Skipped (no gate call, no audit, no telemetry)
//!      │
//!      ▼
//! build context ─▶ gate.permission(action, ctx).await
//!      │                          │
//!   allowed                     denied
//!      ▼                          ▼
//! mutate entity              sink.log(action_denied)
//! advance revision           ledger.record(action_denied)
//! ledger.record(action)      entity untouched
//! sink.log(action)
//!      ▼                          ▼
//! Allowed(result)              Denied
//! ```
//!
//! The gate verdict is always awaited before either branch runs; entity
//! state is never mutated speculatively.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::audit::{AuditEntry, AuditLedger, EntryDraft, DENIED_SUFFIX};
use crate::clock::Clock;
use crate::context::{OpContext, SessionTags, KEY_ACTOR, KEY_SUBJECT_ID, KEY_SUBJECT_KIND};
use crate::gate::PermissionGate;
use crate::revision::Revisioned;
use crate::sink::AnalyticsSink;

/// Operation name used for free-form notes.
pub const NOTE_OPERATION: &str = "note";

/// Caller-visible result of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// The gate allowed the operation and it was applied
    Allowed(R),
    /// The gate refused the operation; nothing changed
    Denied,
    /// The precondition found nothing to do; the gate was not consulted
    Skipped,
}

impl<R> Outcome<R> {
    /// Returns true if the operation was applied.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed(_))
    }

    /// Returns true if the gate refused the operation.
    pub fn is_denied(&self) -> bool {
        matches!(self, Outcome::Denied)
    }

    /// Returns true if the operation was a no-op.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }

    /// Returns the result of an applied operation.
    pub fn allowed(self) -> Option<R> {
        match self {
            Outcome::Allowed(value) => Some(value),
            Outcome::Denied | Outcome::Skipped => None,
        }
    }

    /// Maps the result of an applied operation.
    pub fn map<U, F: FnOnce(R) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Allowed(value) => Outcome::Allowed(f(value)),
            Outcome::Denied => Outcome::Denied,
            Outcome::Skipped => Outcome::Skipped,
        }
    }
}

/// Description of one gated operation.
///
/// # Example
///
/// ```
/// use trust_center::Operation;
///
/// let op = Operation::new("updateCharge")
///     .actor(Some("staff-3"))
///     .field("amount_cents", 1800);
///
/// assert_eq!(op.action(), "updateCharge");
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    action: String,
    subject_id: Option<String>,
    actor: Option<String>,
    fields: OpContext,
    noop: bool,
    escalate_hint: bool,
}

impl Operation {
    /// Starts an operation named `action`.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            subject_id: None,
            actor: None,
            fields: OpContext::new(),
            noop: false,
            escalate_hint: false,
        }
    }

    /// Sets the acting principal.
    pub fn actor<S: Into<String>>(mut self, actor: Option<S>) -> Self {
        self.actor = actor.map(Into::into);
        self
    }

    /// Overrides the audited subject id (defaults to the entity's own id).
    ///
    /// Used when the mutated entity is a collection and the operation
    /// concerns one member, such as creating a record inside a book.
    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Adds an operation-specific context field.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// Marks the operation as a true no-op when `noop` holds.
    pub fn skip_if(mut self, noop: bool) -> Self {
        self.noop = self.noop || noop;
        self
    }

    /// Forces escalation of the success entry.
    pub fn escalate(mut self, hint: bool) -> Self {
        self.escalate_hint = hint;
        self
    }

    /// Returns the action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the acting principal.
    pub fn actor_id(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

/// What a mutation closure reports back: its result, a human-readable
/// description of the change, and extra telemetry fields.
#[derive(Debug, Clone)]
pub struct Change<R = ()> {
    value: R,
    detail: String,
    fields: OpContext,
}

impl Change<()> {
    /// A change with no result value.
    pub fn new(detail: impl Into<String>) -> Self {
        Change::with_value((), detail)
    }
}

impl<R> Change<R> {
    /// A change producing `value`.
    pub fn with_value(value: R, detail: impl Into<String>) -> Self {
        Self {
            value,
            detail: detail.into(),
            fields: OpContext::new(),
        }
    }

    /// Adds a result field to the success telemetry event.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.fields.insert(key, value);
        self
    }
}

/// Orchestrates gate, ledger and sink for entity operations.
///
/// Instances are cheap to clone and are normally obtained from
/// [`TrustCenter::session`](crate::TrustCenter::session), which freezes the
/// gate and sink before any traffic.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Utc;
/// use trust_center::{
///     AllowAll, Change, EntityRevisionMetadata, GuardedMutation, NoopSink, Operation,
///     Revisioned, SessionTags, SystemClock,
/// };
/// use trust_center::audit::AuditLedger;
///
/// struct Appointment {
///     id: String,
///     slot: String,
///     revision: EntityRevisionMetadata,
/// }
///
/// impl Revisioned for Appointment {
///     fn subject_kind(&self) -> &'static str { "appointment" }
///     fn subject_id(&self) -> String { self.id.clone() }
///     fn revision(&self) -> &EntityRevisionMetadata { &self.revision }
///     fn revision_mut(&mut self) -> &mut EntityRevisionMetadata { &mut self.revision }
/// }
///
/// let guard = GuardedMutation::new(
///     Arc::new(AllowAll),
///     Arc::new(NoopSink),
///     Arc::new(SessionTags::new().with_role("owner")),
///     Arc::new(SystemClock),
/// );
/// let ledger = AuditLedger::new("appointments", 200);
/// let mut appt = Appointment {
///     id: "ap-1".into(),
///     slot: "09:00".into(),
///     revision: EntityRevisionMetadata::new(Some("owner".into()), Utc::now()),
/// };
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let outcome = guard
///     .execute(&ledger, &mut appt, Operation::new("reschedule").actor(Some("owner")), |a| {
///         a.slot = "10:30".into();
///         Change::new("slot 09:00 -> 10:30")
///     })
///     .await;
/// assert!(outcome.is_allowed());
/// # });
/// assert_eq!(appt.slot, "10:30");
/// assert_eq!(ledger.len(), 1);
/// ```
#[derive(Clone)]
pub struct GuardedMutation {
    gate: Arc<dyn PermissionGate>,
    sink: Arc<dyn AnalyticsSink>,
    session: Arc<SessionTags>,
    clock: Arc<dyn Clock>,
}

impl GuardedMutation {
    /// Assembles a guard from its collaborators.
    pub fn new(
        gate: Arc<dyn PermissionGate>,
        sink: Arc<dyn AnalyticsSink>,
        session: Arc<SessionTags>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gate,
            sink,
            session,
            clock,
        }
    }

    /// Returns the ambient session tags.
    pub fn session(&self) -> &SessionTags {
        &self.session
    }

    /// Returns the current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Runs `op` against `entity`, applying `mutate` only if the gate allows.
    pub async fn execute<E, R, F>(
        &self,
        ledger: &AuditLedger,
        entity: &mut E,
        op: Operation,
        mutate: F,
    ) -> Outcome<R>
    where
        E: Revisioned + ?Sized,
        F: FnOnce(&mut E) -> Change<R>,
    {
        if op.noop {
            tracing::trace!(
                target: "trust_center::gate",
                action = %op.action,
                "precondition not met, skipping"
            );
            return Outcome::Skipped;
        }

        let kind = entity.subject_kind();
        let subject = op.subject_id.clone().unwrap_or_else(|| entity.subject_id());
        let context = self.context_for(&op, &subject, kind);

        let allowed = self.gate.permission(&op.action, &context).await;
        tracing::debug!(
            target: "trust_center::gate",
            gate = self.gate.name(),
            action = %op.action,
            subject_id = %subject,
            allowed,
            "permission decided"
        );

        if !allowed {
            let denied = format!("{}{}", op.action, DENIED_SUFFIX);
            tracing::info!(
                target: "trust_center::gate",
                gate = self.gate.name(),
                action = %op.action,
                subject_id = %subject,
                "operation denied"
            );
            self.emit(&denied, &context);
            ledger.record(
                EntryDraft::new(denied, subject)
                    .subject_kind(kind)
                    .detail(format!("{} refused", op.action))
                    .actor(op.actor)
                    .tags(&self.session)
                    .escalate_hint(false),
            );
            return Outcome::Denied;
        }

        let change = mutate(entity);
        entity.revision_mut().advance(self.clock.now(), op.actor.clone());
        ledger.record(
            EntryDraft::new(op.action.clone(), subject)
                .subject_kind(kind)
                .detail(change.detail)
                .actor(op.actor)
                .tags(&self.session)
                .escalate_hint(op.escalate_hint),
        );
        self.emit(&op.action, &context.union(&change.fields));

        Outcome::Allowed(change.value)
    }

    /// Appends a free-form note about `entity`. Notes are not gated and do
    /// not touch revision metadata.
    pub fn note<E>(
        &self,
        ledger: &AuditLedger,
        entity: &E,
        actor: Option<&str>,
        text: impl Into<String>,
    ) -> AuditEntry
    where
        E: Revisioned + ?Sized,
    {
        ledger.record(
            EntryDraft::new(NOTE_OPERATION, entity.subject_id())
                .subject_kind(entity.subject_kind())
                .detail(text)
                .actor(actor)
                .tags(&self.session),
        )
    }

    fn context_for(&self, op: &Operation, subject: &str, kind: &str) -> OpContext {
        let mut context = OpContext::new()
            .with(KEY_SUBJECT_ID, subject)
            .with(KEY_SUBJECT_KIND, kind);
        if let Some(actor) = &op.actor {
            context.insert(KEY_ACTOR, actor);
        }
        self.session.apply_to(&mut context);
        context.merge(&op.fields);
        context
    }

    fn emit(&self, event: &str, info: &OpContext) {
        let sink = &self.sink;
        if std::panic::catch_unwind(AssertUnwindSafe(|| sink.log(event, info))).is_err() {
            tracing::warn!(
                target: "trust_center::telemetry",
                event,
                "analytics sink panicked, event dropped"
            );
        }
    }
}

impl std::fmt::Debug for GuardedMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedMutation")
            .field("gate", &self.gate.name())
            .field("session", &self.session)
            .field("clock", &self.clock)
            .finish()
    }
}
