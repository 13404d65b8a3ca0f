//! Reference entity-domains wired through [`GuardedMutation`](crate::GuardedMutation).
//!
//! Each domain owns one ledger (named by its `DOMAIN` constant) and routes
//! every state change through the guarded path. Business rules are kept
//! deliberately thin; these types exist to show how entities plug into the
//! core, and are what the integration tests drive.

pub mod charges;
pub mod inventory;
pub mod loyalty;
