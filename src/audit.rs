//! Bounded in-memory audit logging.
//!
//! This module provides:
//! - `AuditEntry`: immutable record of one operation
//! - `EntryDraft`: caller-supplied fields for a new entry
//! - `AuditLedger`: bounded, mutex-guarded, append-only log for one domain
//! - `LedgerRegistry`: one ledger per entity-domain
//! - `Escalation`: keyword classifier deciding which entries need review
//! - `AuditQuery`: filters over a ledger's retained entries
//!
//! Entries are never persisted. A ledger keeps at most its capacity and
//! drops the oldest entries first.

mod entry;
mod escalation;
mod export;
mod ledger;
mod query;
mod registry;

pub use entry::{AuditEntry, EntryDraft, DENIED_SUFFIX};
pub use escalation::{is_escalated, Escalation, DEFAULT_KEYWORDS};
pub use export::{entries_to_json, entry_to_json, parse_export, parse_export_all};
pub use ledger::{AuditLedger, LedgerStats, DEFAULT_CAPACITY, EMPTY_SUMMARY};
pub use query::AuditQuery;
pub use registry::LedgerRegistry;
