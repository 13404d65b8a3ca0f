//! One ledger per entity-domain.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::escalation::Escalation;
use super::ledger::{AuditLedger, LedgerStats, DEFAULT_CAPACITY};
use crate::clock::{Clock, SystemClock};

/// Hands out the shared ledger for each entity-domain, creating it on first
/// use with the registry's capacity, classifier and clock.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trust_center::audit::LedgerRegistry;
///
/// let registry = LedgerRegistry::new(50);
/// let charges = registry.ledger("charges");
/// assert!(Arc::ptr_eq(&charges, &registry.ledger("charges")));
/// assert_eq!(registry.domains(), ["charges"]);
/// ```
pub struct LedgerRegistry {
    capacity: usize,
    escalation: Escalation,
    clock: Arc<dyn Clock>,
    ledgers: RwLock<BTreeMap<String, Arc<AuditLedger>>>,
}

impl LedgerRegistry {
    /// Creates a registry whose ledgers hold `capacity` entries each.
    pub fn new(capacity: usize) -> Self {
        Self::with_parts(capacity, Escalation::default(), Arc::new(SystemClock))
    }

    /// Creates a registry with an explicit classifier and clock.
    pub fn with_parts(capacity: usize, escalation: Escalation, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            escalation,
            clock,
            ledgers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the ledger for `domain`, creating it if needed.
    pub fn ledger(&self, domain: &str) -> Arc<AuditLedger> {
        if let Some(existing) = self.ledgers.read().get(domain) {
            return Arc::clone(existing);
        }
        let mut ledgers = self.ledgers.write();
        Arc::clone(ledgers.entry(domain.to_string()).or_insert_with(|| {
            tracing::debug!(
                target: "trust_center::audit",
                domain,
                capacity = self.capacity,
                "ledger created"
            );
            Arc::new(AuditLedger::with_parts(
                domain,
                self.capacity,
                self.escalation.clone(),
                Arc::clone(&self.clock),
            ))
        }))
    }

    /// Returns the ledger for `domain` only if it already exists.
    pub fn get(&self, domain: &str) -> Option<Arc<AuditLedger>> {
        self.ledgers.read().get(domain).cloned()
    }

    /// Returns the known domains in sorted order.
    pub fn domains(&self) -> Vec<String> {
        self.ledgers.read().keys().cloned().collect()
    }

    /// Returns counters for every ledger.
    pub fn stats(&self) -> Vec<LedgerStats> {
        self.ledgers.read().values().map(|l| l.stats()).collect()
    }

    /// Clears every ledger.
    pub fn clear_all(&self) {
        for ledger in self.ledgers.read().values() {
            ledger.clear();
        }
    }
}

impl Default for LedgerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
