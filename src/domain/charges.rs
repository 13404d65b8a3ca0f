//! Customer charges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::audit::{AuditEntry, AuditLedger};
use crate::mutation::{Change, GuardedMutation, Operation, Outcome};
use crate::revision::{EntityRevisionMetadata, Revisioned};

/// Ledger domain for charges.
pub const DOMAIN: &str = "charges";

/// Lifecycle state of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Awaiting payment
    Open,
    /// Money returned to the customer
    Refunded,
}

/// One charge against a customer.
#[derive(Debug, Clone, Serialize)]
pub struct Charge {
    id: String,
    customer: String,
    amount_cents: i64,
    status: ChargeStatus,
    revision: EntityRevisionMetadata,
}

impl Charge {
    /// Returns the charge id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the customer the charge belongs to.
    pub fn customer(&self) -> &str {
        &self.customer
    }

    /// Returns the amount in cents.
    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    /// Returns the status.
    pub fn status(&self) -> ChargeStatus {
        self.status
    }
}

impl Revisioned for Charge {
    fn subject_kind(&self) -> &'static str {
        "charge"
    }

    fn subject_id(&self) -> String {
        self.id.clone()
    }

    fn revision(&self) -> &EntityRevisionMetadata {
        &self.revision
    }

    fn revision_mut(&mut self) -> &mut EntityRevisionMetadata {
        &mut self.revision
    }
}

/// A business's collection of charges.
///
/// Creating and removing charges mutates the book; editing and refunding
/// mutate the individual charge.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeBook {
    id: String,
    charges: BTreeMap<String, Charge>,
    next_number: u64,
    revision: EntityRevisionMetadata,
}

impl ChargeBook {
    /// Creates an empty book.
    pub fn new(id: impl Into<String>, created_by: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            charges: BTreeMap::new(),
            next_number: 1,
            revision: EntityRevisionMetadata::new(created_by, at),
        }
    }

    /// Returns a charge by id.
    pub fn get(&self, id: &str) -> Option<&Charge> {
        self.charges.get(id)
    }

    /// Returns the number of charges.
    pub fn len(&self) -> usize {
        self.charges.len()
    }

    /// Returns true if the book holds no charges.
    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }

    /// Iterates charges in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Charge> {
        self.charges.values()
    }

    /// Creates a charge and returns its id.
    pub async fn create(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        customer: &str,
        amount_cents: i64,
    ) -> Outcome<String> {
        let id = format!("{}-ch-{}", self.id, self.next_number);
        let at = guard.now();
        let op = Operation::new("createCharge")
            .subject(id.clone())
            .actor(actor)
            .field("customer", customer)
            .field("amount_cents", amount_cents);

        guard
            .execute(ledger, self, op, |book| {
                book.next_number += 1;
                book.charges.insert(
                    id.clone(),
                    Charge {
                        id: id.clone(),
                        customer: customer.to_string(),
                        amount_cents,
                        status: ChargeStatus::Open,
                        revision: EntityRevisionMetadata::new(actor.map(str::to_string), at),
                    },
                );
                Change::with_value(id.clone(), format!("charged {customer} {amount_cents} cents"))
                    .field("charge_id", &id)
            })
            .await
    }

    /// Changes the amount of an open charge and returns the previous amount.
    ///
    /// Skipped if the charge is unknown, refunded, or already at `amount_cents`.
    pub async fn update_amount(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        id: &str,
        amount_cents: i64,
    ) -> Outcome<i64> {
        let Some(charge) = self.charges.get_mut(id) else {
            return Outcome::Skipped;
        };
        let op = Operation::new("updateCharge")
            .actor(actor)
            .field("amount_cents", amount_cents)
            .skip_if(
                charge.status == ChargeStatus::Refunded || charge.amount_cents == amount_cents,
            );

        guard
            .execute(ledger, charge, op, |c| {
                let previous = c.amount_cents;
                c.amount_cents = amount_cents;
                Change::with_value(previous, format!("amount {previous} -> {amount_cents}"))
                    .field("previous_cents", previous)
            })
            .await
    }

    /// Refunds an open charge.
    pub async fn refund(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        id: &str,
    ) -> Outcome<()> {
        let Some(charge) = self.charges.get_mut(id) else {
            return Outcome::Skipped;
        };
        let op = Operation::new("refundCharge")
            .actor(actor)
            .field("amount_cents", charge.amount_cents)
            .skip_if(charge.status == ChargeStatus::Refunded);

        guard
            .execute(ledger, charge, op, |c| {
                c.status = ChargeStatus::Refunded;
                Change::new(format!("refunded {} cents", c.amount_cents))
            })
            .await
    }

    /// Removes a charge and returns it. Skipped if the id is not present.
    pub async fn remove(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        id: &str,
    ) -> Outcome<Charge> {
        let op = Operation::new("deleteCharge")
            .subject(id)
            .actor(actor)
            .skip_if(!self.charges.contains_key(id));

        let outcome = guard
            .execute(ledger, self, op, |book| {
                let removed = book.charges.remove(id);
                Change::with_value(removed, format!("removed charge {id}"))
            })
            .await;
        match outcome {
            Outcome::Allowed(Some(charge)) => Outcome::Allowed(charge),
            Outcome::Allowed(None) | Outcome::Skipped => Outcome::Skipped,
            Outcome::Denied => Outcome::Denied,
        }
    }

    /// Attaches a free-form note to a charge. Returns `None` for an unknown id.
    pub fn add_note(
        &self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        id: &str,
        text: &str,
    ) -> Option<AuditEntry> {
        let charge = self.charges.get(id)?;
        Some(guard.note(ledger, charge, actor, text))
    }
}

impl Revisioned for ChargeBook {
    fn subject_kind(&self) -> &'static str {
        "charge_book"
    }

    fn subject_id(&self) -> String {
        self.id.clone()
    }

    fn revision(&self) -> &EntityRevisionMetadata {
        &self.revision
    }

    fn revision_mut(&mut self) -> &mut EntityRevisionMetadata {
        &mut self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::context::SessionTags;
    use crate::gate::{AllowAll, DenyAll, PermissionGate};
    use crate::sink::MemorySink;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()
    }

    fn guard(gate: Arc<dyn PermissionGate>, clock: Arc<ManualClock>) -> GuardedMutation {
        GuardedMutation::new(
            gate,
            Arc::new(MemorySink::new()),
            Arc::new(SessionTags::new().with_role("owner")),
            clock,
        )
    }

    #[tokio::test]
    async fn create_update_refund_flow() {
        let clock = Arc::new(ManualClock::new(t0()));
        let guard = guard(Arc::new(AllowAll), clock.clone());
        let ledger = AuditLedger::new(DOMAIN, 50);
        let mut book = ChargeBook::new("shop", Some("owner".into()), t0());

        let id = book
            .create(&guard, &ledger, Some("owner"), "alice", 1500)
            .await
            .allowed()
            .unwrap();
        assert_eq!(id, "shop-ch-1");
        assert_eq!(book.get(&id).unwrap().amount_cents(), 1500);

        clock.advance(Duration::minutes(1));
        let previous = book
            .update_amount(&guard, &ledger, Some("owner"), &id, 1800)
            .await;
        assert_eq!(previous, Outcome::Allowed(1500));
        assert_eq!(
            book.get(&id).unwrap().revision().last_modified(),
            t0() + Duration::minutes(1)
        );

        assert!(book.refund(&guard, &ledger, Some("owner"), &id).await.is_allowed());
        assert_eq!(book.get(&id).unwrap().status(), ChargeStatus::Refunded);

        // refunded charges cannot be edited or refunded again
        assert!(book
            .update_amount(&guard, &ledger, Some("owner"), &id, 10)
            .await
            .is_skipped());
        assert!(book.refund(&guard, &ledger, Some("owner"), &id).await.is_skipped());

        let ops: Vec<String> = ledger
            .snapshot()
            .iter()
            .map(|e| e.operation().to_string())
            .collect();
        assert_eq!(ops, ["createCharge", "updateCharge", "refundCharge"]);
        assert_eq!(ledger.snapshot()[0].subject_id(), "shop-ch-1");
    }

    #[tokio::test]
    async fn remove_missing_charge_is_skipped() {
        let clock = Arc::new(ManualClock::new(t0()));
        let guard = guard(Arc::new(AllowAll), clock);
        let ledger = AuditLedger::new(DOMAIN, 50);
        let mut book = ChargeBook::new("shop", None, t0());

        let outcome = book.remove(&guard, &ledger, Some("owner"), "nope").await;

        assert!(outcome.is_skipped());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn remove_is_escalated() {
        let clock = Arc::new(ManualClock::new(t0()));
        let guard = guard(Arc::new(AllowAll), clock);
        let ledger = AuditLedger::new(DOMAIN, 50);
        let mut book = ChargeBook::new("shop", None, t0());
        let id = book
            .create(&guard, &ledger, None, "bob", 900)
            .await
            .allowed()
            .unwrap();

        let removed = book.remove(&guard, &ledger, Some("owner"), &id).await;

        assert_eq!(removed.allowed().map(|c| c.customer().to_string()), Some("bob".into()));
        assert!(book.is_empty());
        let last = ledger.last().unwrap();
        assert_eq!(last.operation(), "deleteCharge");
        assert_eq!(last.subject_id(), id);
        assert!(last.escalate());
    }

    #[tokio::test]
    async fn denied_create_leaves_book_untouched() {
        let clock = Arc::new(ManualClock::new(t0()));
        let guard = guard(Arc::new(DenyAll), clock);
        let ledger = AuditLedger::new(DOMAIN, 50);
        let mut book = ChargeBook::new("shop", None, t0());

        let outcome = book.create(&guard, &ledger, Some("staff"), "carol", 100).await;

        assert!(outcome.is_denied());
        assert!(book.is_empty());
        assert_eq!(ledger.last().unwrap().operation(), "createCharge_denied");
    }

    #[tokio::test]
    async fn notes_need_a_known_charge() {
        let clock = Arc::new(ManualClock::new(t0()));
        let guard = guard(Arc::new(AllowAll), clock);
        let ledger = AuditLedger::new(DOMAIN, 50);
        let mut book = ChargeBook::new("shop", None, t0());
        let id = book
            .create(&guard, &ledger, None, "dana", 100)
            .await
            .allowed()
            .unwrap();

        assert!(book.add_note(&guard, &ledger, None, "missing", "hi").is_none());
        let note = book
            .add_note(&guard, &ledger, Some("staff"), &id, "paid in cash")
            .unwrap();
        assert_eq!(note.subject_kind(), Some("charge"));
        assert_eq!(note.detail(), "paid in cash");
    }
}
