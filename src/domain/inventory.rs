//! Stock levels and low-stock automation.
//!
//! Stock is adjusted interactively, while a background sweep raises restock
//! tasks for items that fall below their threshold. Both go through the same
//! guarded path, so the sweep is subject to the gate like any staff member.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::AuditLedger;
use crate::mutation::{Change, GuardedMutation, Operation, Outcome};
use crate::revision::{EntityRevisionMetadata, Revisioned};

/// Ledger domain for inventory.
pub const DOMAIN: &str = "inventory";

/// Actor recorded for automated restock requests.
pub const AUTOMATION_ACTOR: &str = "automation";

/// A stocked product.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryItem {
    sku: String,
    name: String,
    on_hand: u64,
    threshold: u64,
    pending_restock: Option<u64>,
    revision: EntityRevisionMetadata,
}

impl InventoryItem {
    /// Creates an item with `on_hand` units and a low-stock `threshold`.
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        on_hand: u64,
        threshold: u64,
        created_by: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            on_hand,
            threshold,
            pending_restock: None,
            revision: EntityRevisionMetadata::new(created_by, at),
        }
    }

    /// Returns the SKU.
    pub fn sku(&self) -> &str {
        &self.sku
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the units on hand.
    pub fn on_hand(&self) -> u64 {
        self.on_hand
    }

    /// Returns the low-stock threshold.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Returns the quantity of an open restock task.
    pub fn pending_restock(&self) -> Option<u64> {
        self.pending_restock
    }

    /// Returns true if stock is strictly below the threshold.
    pub fn is_low(&self) -> bool {
        self.on_hand < self.threshold
    }

    /// Adds (positive) or removes (negative) units; stock never goes below
    /// zero. Returns the new level. Skipped for a zero delta.
    pub async fn adjust_stock(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        delta: i64,
    ) -> Outcome<u64> {
        let op = Operation::new("adjustStock")
            .actor(actor)
            .field("delta", delta)
            .skip_if(delta == 0);

        guard
            .execute(ledger, self, op, |item| {
                let before = item.on_hand;
                item.on_hand = if delta >= 0 {
                    before.saturating_add(delta.unsigned_abs())
                } else {
                    before.saturating_sub(delta.unsigned_abs())
                };
                if !item.is_low() {
                    item.pending_restock = None;
                }
                Change::with_value(item.on_hand, format!("on hand {before} -> {}", item.on_hand))
                    .field("on_hand", item.on_hand)
            })
            .await
    }

    /// Changes the low-stock threshold. Skipped if unchanged.
    pub async fn set_threshold(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        threshold: u64,
    ) -> Outcome<()> {
        let op = Operation::new("setThreshold")
            .actor(actor)
            .field("threshold", threshold)
            .skip_if(threshold == self.threshold);

        guard
            .execute(ledger, self, op, |item| {
                let before = item.threshold;
                item.threshold = threshold;
                Change::new(format!("threshold {before} -> {threshold}"))
            })
            .await
    }

    /// Opens a restock task for a low item and returns its quantity.
    ///
    /// Skipped if the item is not low or a task is already open. The
    /// quantity brings stock back to twice the threshold.
    pub async fn request_restock(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
    ) -> Outcome<u64> {
        let quantity = self.threshold.saturating_mul(2).saturating_sub(self.on_hand);
        let op = Operation::new("createRestockTask")
            .actor(Some(AUTOMATION_ACTOR))
            .field("quantity", quantity)
            .skip_if(!self.is_low() || self.pending_restock.is_some());

        guard
            .execute(ledger, self, op, |item| {
                item.pending_restock = Some(quantity);
                Change::with_value(quantity, format!("restock {quantity} units of {}", item.sku))
            })
            .await
    }
}

impl Revisioned for InventoryItem {
    fn subject_kind(&self) -> &'static str {
        "inventory_item"
    }

    fn subject_id(&self) -> String {
        self.sku.clone()
    }

    fn revision(&self) -> &EntityRevisionMetadata {
        &self.revision
    }

    fn revision_mut(&mut self) -> &mut EntityRevisionMetadata {
        &mut self.revision
    }
}

/// Runs the low-stock sweep over `items` and returns the SKUs that received
/// a new restock task.
pub async fn low_stock_sweep(
    guard: &GuardedMutation,
    ledger: &AuditLedger,
    items: &mut [InventoryItem],
) -> Vec<String> {
    let mut raised = Vec::new();
    for item in items.iter_mut() {
        if item.request_restock(guard, ledger).await.is_allowed() {
            raised.push(item.sku.clone());
        }
    }
    tracing::debug!(
        target: "trust_center::inventory",
        raised = raised.len(),
        "low-stock sweep finished"
    );
    raised
}
