//! Bounded, concurrency-safe audit ledger.
//!
//! One ledger exists per entity-domain. All access goes through a single
//! mutex: appends, eviction, snapshots and `clear()` are serialized, and the
//! lock is never held across an `.await`. Readers always receive owned
//! copies.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::entry::{AuditEntry, EntryDraft};
use super::escalation::Escalation;
use super::export;
use super::query::AuditQuery;
use crate::clock::{Clock, SystemClock};

/// Default number of entries a ledger retains.
pub const DEFAULT_CAPACITY: usize = 200;

/// Returned by [`AuditLedger::summary`] when the ledger is empty.
pub const EMPTY_SUMMARY: &str = "no events recorded";

/// Point-in-time counters for one ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Domain the ledger belongs to
    pub domain: String,
    /// Maximum retained entries
    pub capacity: usize,
    /// Entries currently retained
    pub len: usize,
    /// Entries ever appended (including evicted and cleared ones)
    pub recorded: u64,
    /// Entries removed by capacity pressure
    pub evicted: u64,
    /// Retained entries flagged for escalation
    pub escalated: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: VecDeque<AuditEntry>,
    next_seq: u64,
    evicted: u64,
}

/// Append-only audit log with a fixed capacity and FIFO eviction.
///
/// `len() <= capacity()` holds after every call. When an append pushes the
/// ledger over capacity, the excess oldest entries are removed in one batch.
///
/// # Example
///
/// ```
/// use trust_center::audit::{AuditLedger, EntryDraft};
///
/// let ledger = AuditLedger::new("charges", 3);
/// for op in ["a", "b", "c", "d"] {
///     ledger.record(EntryDraft::new(op, "ch-1"));
/// }
///
/// let ops: Vec<String> = ledger
///     .recent(10)
///     .iter()
///     .map(|e| e.operation().to_string())
///     .collect();
/// assert_eq!(ops, ["b", "c", "d"]);
/// ```
pub struct AuditLedger {
    domain: String,
    capacity: usize,
    escalation: Escalation,
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl AuditLedger {
    /// Creates a ledger for `domain` holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one; configuration rejects it earlier.
    pub fn new(domain: impl Into<String>, capacity: usize) -> Self {
        Self::with_parts(
            domain,
            capacity,
            Escalation::default(),
            Arc::new(SystemClock),
        )
    }

    /// Creates a ledger with an explicit classifier and clock.
    pub fn with_parts(
        domain: impl Into<String>,
        capacity: usize,
        escalation: Escalation,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            domain: domain.into(),
            capacity,
            escalation,
            clock,
            state: Mutex::new(LedgerState {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY) + 1),
                ..LedgerState::default()
            }),
        }
    }

    /// Returns the domain this ledger records.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Appends an entry built from `draft` and returns a copy of it.
    ///
    /// Escalation is classified here, once. Never fails; detail text is
    /// stored as given.
    pub fn record(&self, draft: EntryDraft) -> AuditEntry {
        let escalate = self
            .escalation
            .classify(draft.operation(), draft.detail_text(), draft.hint());
        let timestamp = self.clock.now();

        let (entry, evicted) = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;

            let entry = AuditEntry::from_draft(draft, seq, &self.domain, timestamp, escalate);
            state.entries.push_back(entry.clone());

            let excess = state.entries.len().saturating_sub(self.capacity);
            if excess > 0 {
                state.entries.drain(..excess);
                state.evicted += excess as u64;
            }
            (entry, excess)
        };

        if escalate {
            tracing::warn!(
                target: "trust_center::audit",
                domain = %self.domain,
                seq = entry.seq(),
                operation = %entry.operation(),
                subject_id = %entry.subject_id(),
                actor = ?entry.actor(),
                "escalated audit entry"
            );
        } else {
            tracing::debug!(
                target: "trust_center::audit",
                domain = %self.domain,
                seq = entry.seq(),
                operation = %entry.operation(),
                subject_id = %entry.subject_id(),
                "audit entry"
            );
        }
        if evicted > 0 {
            tracing::debug!(
                target: "trust_center::audit",
                domain = %self.domain,
                evicted,
                "evicted oldest entries"
            );
        }

        entry
    }

    /// Returns the last `min(n, len)` entries in arrival order.
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let state = self.state.lock();
        let skip = state.entries.len().saturating_sub(n);
        state.entries.iter().skip(skip).cloned().collect()
    }

    /// Returns every retained entry in arrival order.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.state.lock().entries.iter().cloned().collect()
    }

    /// Returns the most recent entry.
    pub fn last(&self) -> Option<AuditEntry> {
        self.state.lock().entries.back().cloned()
    }

    /// Returns retained entries matching `query`, in arrival order.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let matched: Vec<AuditEntry> = {
            let state = self.state.lock();
            state
                .entries
                .iter()
                .filter(|e| query.matches(e))
                .cloned()
                .collect()
        };
        query.truncate(matched)
    }

    /// Serializes the last entry as JSON, or `None` if the ledger is empty.
    pub fn export_last(&self) -> Option<String> {
        let last = self.last()?;
        export::entry_to_json(&last)
    }

    /// Serializes all retained entries as a JSON array, or `None` if the
    /// ledger is empty.
    pub fn export_all(&self) -> Option<String> {
        export::entries_to_json(&self.snapshot())
    }

    /// Describes the last entry, or returns [`EMPTY_SUMMARY`].
    pub fn summary(&self) -> String {
        match self.last() {
            Some(entry) => entry.to_string(),
            None => EMPTY_SUMMARY.to_string(),
        }
    }

    /// Removes every retained entry. Sequence numbers keep increasing.
    pub fn clear(&self) {
        let cleared = {
            let mut state = self.state.lock();
            let n = state.entries.len();
            state.entries.clear();
            n
        };
        tracing::debug!(
            target: "trust_center::audit",
            domain = %self.domain,
            cleared,
            "ledger cleared"
        );
    }

    /// Returns current counters.
    pub fn stats(&self) -> LedgerStats {
        let state = self.state.lock();
        LedgerStats {
            domain: self.domain.clone(),
            capacity: self.capacity,
            len: state.entries.len(),
            recorded: state.next_seq,
            evicted: state.evicted,
            escalated: state.entries.iter().filter(|e| e.escalate()).count(),
        }
    }
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("domain", &self.domain)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::context::SessionTags;
    use chrono::{Duration, TimeZone, Utc};

    fn ops(entries: &[AuditEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.operation()).collect()
    }

    #[test]
    fn ledger_starts_empty() {
        let ledger = AuditLedger::new("charges", 10);
        assert!(ledger.is_empty());
        assert_eq!(ledger.len(), 0);
        assert!(ledger.recent(5).is_empty());
        assert!(ledger.last().is_none());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let ledger = AuditLedger::new("charges", 0);
        assert_eq!(ledger.capacity(), 1);
        ledger.record(EntryDraft::new("a", "x"));
        ledger.record(EntryDraft::new("b", "x"));
        assert_eq!(ops(&ledger.snapshot()), vec!["b"]);
    }

    #[test]
    fn capacity_three_keeps_newest_three() {
        let ledger = AuditLedger::new("charges", 3);
        for op in ["a", "b", "c", "d"] {
            ledger.record(EntryDraft::new(op, "ch-1"));
        }

        assert_eq!(ops(&ledger.recent(10)), vec!["b", "c", "d"]);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn recent_returns_tail_in_arrival_order() {
        let ledger = AuditLedger::new("inventory", 50);
        for i in 0..10 {
            ledger.record(EntryDraft::new(format!("op{i}"), "item-1"));
        }

        assert_eq!(ops(&ledger.recent(3)), vec!["op7", "op8", "op9"]);
        assert_eq!(ledger.recent(0).len(), 0);
        assert_eq!(ledger.recent(100).len(), 10);
    }

    #[test]
    fn recent_is_an_independent_snapshot() {
        let ledger = AuditLedger::new("charges", 5);
        ledger.record(EntryDraft::new("a", "x"));
        let before = ledger.recent(5);

        ledger.record(EntryDraft::new("b", "x"));
        ledger.clear();

        assert_eq!(ops(&before), vec!["a"]);
    }

    #[test]
    fn record_assigns_increasing_sequence_numbers() {
        let ledger = AuditLedger::new("charges", 2);
        let first = ledger.record(EntryDraft::new("a", "x"));
        let second = ledger.record(EntryDraft::new("b", "x"));
        let third = ledger.record(EntryDraft::new("c", "x"));

        assert_eq!((first.seq(), second.seq(), third.seq()), (0, 1, 2));
        assert_eq!(ledger.snapshot()[0].seq(), 1);
    }

    #[test]
    fn record_classifies_escalation_once() {
        let ledger = AuditLedger::new("charges", 10);

        assert!(ledger.record(EntryDraft::new("deleteCharge", "ch-1")).escalate());
        assert!(!ledger.record(EntryDraft::new("update", "ch-1")).escalate());
        assert!(ledger
            .record(EntryDraft::new("update", "ch-1").escalate_hint(true))
            .escalate());
        assert_eq!(ledger.stats().escalated, 2);
    }

    #[test]
    fn record_uses_injected_clock_and_tags() {
        let at = Utc.with_ymd_and_hms(2024, 8, 9, 10, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(at));
        let ledger = AuditLedger::with_parts("loyalty", 10, Escalation::default(), clock.clone());

        let tags = SessionTags::new().with_role("owner").with_staff_id("s-1");
        let first = ledger.record(EntryDraft::new("awardPoints", "acct-1").tags(&tags));
        clock.advance(Duration::seconds(5));
        let second = ledger.record(EntryDraft::new("awardPoints", "acct-1"));

        assert_eq!(first.timestamp(), at);
        assert_eq!(second.timestamp(), at + Duration::seconds(5));
        assert_eq!(first.role(), Some("owner"));
        assert_eq!(first.domain(), "loyalty");
        assert_eq!(second.role(), None);
    }

    #[test]
    fn summary_uses_sentinel_when_empty() {
        let ledger = AuditLedger::new("charges", 10);
        assert_eq!(ledger.summary(), EMPTY_SUMMARY);

        ledger.record(EntryDraft::new("refundCharge", "ch-9").actor(Some("staff-2")));
        let summary = ledger.summary();
        assert!(summary.contains("refundCharge"));
        assert!(summary.contains("ch-9"));
        assert!(summary.contains("staff-2"));
    }

    #[test]
    fn clear_empties_but_keeps_counting() {
        let ledger = AuditLedger::new("charges", 10);
        ledger.record(EntryDraft::new("a", "x"));
        ledger.record(EntryDraft::new("b", "x"));
        ledger.clear();

        assert!(ledger.is_empty());
        assert_eq!(ledger.summary(), EMPTY_SUMMARY);

        let next = ledger.record(EntryDraft::new("c", "x"));
        assert_eq!(next.seq(), 2);
        assert_eq!(ledger.stats().recorded, 3);
    }

    #[test]
    fn stats_track_evictions() {
        let ledger = AuditLedger::new("charges", 4);
        for i in 0..10 {
            ledger.record(EntryDraft::new(format!("op{i}"), "x"));
        }

        let stats = ledger.stats();
        assert_eq!(stats.domain, "charges");
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.len, 4);
        assert_eq!(stats.recorded, 10);
        assert_eq!(stats.evicted, 6);
    }

    #[test]
    fn export_on_empty_ledger_is_none() {
        let ledger = AuditLedger::new("charges", 10);
        assert!(ledger.export_last().is_none());
        assert!(ledger.export_all().is_none());
    }

    #[test]
    fn export_last_reflects_last_record() {
        let ledger = AuditLedger::new("charges", 10);
        ledger.record(EntryDraft::new("createCharge", "ch-1"));
        ledger.record(EntryDraft::new("refundCharge", "ch-2"));

        let json = ledger.export_last().unwrap();
        let parsed = export::parse_export(&json).unwrap();
        assert_eq!(parsed.operation(), "refundCharge");
        assert_eq!(parsed.subject_id(), "ch-2");
    }

    #[test]
    fn debug_does_not_dump_entries() {
        let ledger = AuditLedger::new("charges", 10);
        ledger.record(EntryDraft::new("a", "secret-subject"));
        let debug = format!("{:?}", ledger);
        assert!(debug.contains("charges"));
        assert!(!debug.contains("secret-subject"));
    }
}
