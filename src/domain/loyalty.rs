//! Loyalty point balances.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::AuditLedger;
use crate::mutation::{Change, GuardedMutation, Operation, Outcome};
use crate::revision::{EntityRevisionMetadata, Revisioned};

/// Ledger domain for loyalty accounts.
pub const DOMAIN: &str = "loyalty";

/// A customer's point balance.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyAccount {
    id: String,
    customer: String,
    points: u64,
    revision: EntityRevisionMetadata,
}

impl LoyaltyAccount {
    /// Opens an account with a zero balance.
    pub fn open(
        id: impl Into<String>,
        customer: impl Into<String>,
        created_by: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            customer: customer.into(),
            points: 0,
            revision: EntityRevisionMetadata::new(created_by, at),
        }
    }

    /// Returns the customer.
    pub fn customer(&self) -> &str {
        &self.customer
    }

    /// Returns the balance.
    pub fn points(&self) -> u64 {
        self.points
    }

    /// Adds points and returns the new balance.
    pub async fn award_points(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        points: u64,
    ) -> Outcome<u64> {
        let op = Operation::new("awardPoints")
            .actor(actor)
            .field("points", points)
            .skip_if(points == 0);

        guard
            .execute(ledger, self, op, |acct| {
                acct.points = acct.points.saturating_add(points);
                Change::with_value(acct.points, format!("+{points} points"))
                    .field("balance", acct.points)
            })
            .await
    }

    /// Spends points and returns the new balance.
    ///
    /// Skipped for zero points or an insufficient balance.
    pub async fn redeem_points(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
        points: u64,
    ) -> Outcome<u64> {
        let op = Operation::new("redeemPoints")
            .actor(actor)
            .field("points", points)
            .skip_if(points == 0 || points > self.points);

        guard
            .execute(ledger, self, op, |acct| {
                acct.points -= points;
                Change::with_value(acct.points, format!("-{points} points"))
                    .field("balance", acct.points)
            })
            .await
    }

    /// Zeroes the balance. Always escalated for review.
    pub async fn reset(
        &mut self,
        guard: &GuardedMutation,
        ledger: &AuditLedger,
        actor: Option<&str>,
    ) -> Outcome<u64> {
        let op = Operation::new("resetAccount")
            .actor(actor)
            .field("points", self.points)
            .escalate(true);

        guard
            .execute(ledger, self, op, |acct| {
                let forfeited = std::mem::take(&mut acct.points);
                Change::with_value(forfeited, format!("balance of {forfeited} points reset"))
            })
            .await
    }
}

impl Revisioned for LoyaltyAccount {
    fn subject_kind(&self) -> &'static str {
        "loyalty_account"
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
    use crate::clock::SystemClock;
    use crate::context::SessionTags;
    use crate::gate::{AllowAll, RolePolicy};
    use crate::sink::MemorySink;
    use std::sync::Arc;

    fn account() -> LoyaltyAccount {
        LoyaltyAccount::open("acct-1", "erin", Some("owner".into()), Utc::now())
    }

    fn allow_all() -> GuardedMutation {
        GuardedMutation::new(
            Arc::new(AllowAll),
            Arc::new(MemorySink::new()),
            Arc::new(SessionTags::new()),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn award_and_redeem() {
        let guard = allow_all();
        let ledger = AuditLedger::new(DOMAIN, 20);
        let mut acct = account();

        assert_eq!(
            acct.award_points(&guard, &ledger, None, 120).await,
            Outcome::Allowed(120)
        );
        assert_eq!(
            acct.redeem_points(&guard, &ledger, None, 20).await,
            Outcome::Allowed(100)
        );
        assert!(acct.redeem_points(&guard, &ledger, None, 500).await.is_skipped());
        assert!(acct.award_points(&guard, &ledger, None, 0).await.is_skipped());
        assert_eq!(acct.points(), 100);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn reset_is_escalated() {
        let guard = allow_all();
        let ledger = AuditLedger::new(DOMAIN, 20);
        let mut acct = account();
        let _ = acct.award_points(&guard, &ledger, None, 40).await;

        assert_eq!(acct.reset(&guard, &ledger, Some("owner")).await, Outcome::Allowed(40));
        assert_eq!(acct.points(), 0);

        let last = ledger.last().unwrap();
        assert_eq!(last.operation(), "resetAccount");
        assert!(last.escalate());
    }

    #[tokio::test]
    async fn staff_cannot_reset_under_role_policy() {
        let policy = RolePolicy::new()
            .allow("awardPoints", ["staff", "owner"])
            .allow("resetAccount", ["owner"]);
        let sink = Arc::new(MemorySink::new());
        let guard = GuardedMutation::new(
            Arc::new(policy),
            sink.clone(),
            Arc::new(SessionTags::new().with_role("staff")),
            Arc::new(SystemClock),
        );
        let ledger = AuditLedger::new(DOMAIN, 20);
        let mut acct = account();

        let _ = acct.award_points(&guard, &ledger, Some("s-1"), 10).await;
        assert!(acct.reset(&guard, &ledger, Some("s-1")).await.is_denied());

        assert_eq!(acct.points(), 10);
        assert_eq!(sink.names(), vec!["awardPoints", "resetAccount_denied"]);
        // the denial keeps the keyword-free classification of its name
        assert!(!ledger.last().unwrap().escalate());
    }
}
