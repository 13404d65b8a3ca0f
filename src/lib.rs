//! Permission-gated, audited mutations for business entities.
//!
//! Every state-changing operation on an entity (a charge, a stock level, a
//! loyalty balance) is routed through one protocol:
//! - **Authorization**: a pluggable [`PermissionGate`] decides, possibly
//!   asynchronously
//! - **Telemetry**: an [`AnalyticsSink`] sees both allowed and denied
//!   outcomes
//! - **Audit**: an immutable entry is appended to the domain's bounded
//!   [`AuditLedger`](audit::AuditLedger), tagged for escalation when needed
//!
//! # Core Types
//!
//! - [`GuardedMutation`]: runs one operation through gate, mutation, ledger and sink
//! - [`Operation`] / [`Change`] / [`Outcome`]: what is attempted, what changed, what happened
//! - [`EntityRevisionMetadata`]: `createdBy` / `lastModified` / `lastModifiedBy`
//! - [`TrustCenter`]: frozen process-wide wiring built from [`TrustCenterConfig`]
//! - [`audit`]: ledgers, entries, escalation, export and queries
//!
//! # Examples
//!
//! ```
//! use trust_center::{RolePolicy, SessionTags, TrustCenter};
//! use trust_center::domain::loyalty::{self, LoyaltyAccount};
//!
//! let center = TrustCenter::builder()
//!     .gate(RolePolicy::new().allow("awardPoints", ["staff"]))
//!     .build()
//!     .expect("valid configuration");
//!
//! let guard = center.session(SessionTags::new().with_role("staff").with_staff_id("s-1"));
//! let ledger = center.ledger(loyalty::DOMAIN);
//! let mut account = LoyaltyAccount::open("acct-1", "erin", Some("s-1".into()), guard.now());
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let awarded = account.award_points(&guard, &ledger, Some("s-1"), 50).await;
//! assert!(awarded.is_allowed());
//!
//! let reset = account.reset(&guard, &ledger, Some("s-1")).await;
//! assert!(reset.is_denied());
//! # });
//!
//! assert_eq!(account.points(), 50);
//! assert_eq!(ledger.recent(1)[0].operation(), "resetAccount_denied");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod clock;
mod config;
mod context;
pub mod domain;
mod error;
mod gate;
mod mutation;
mod revision;
mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Environment, TrustCenter, TrustCenterBuilder, TrustCenterConfig};
pub use context::{
    OpContext, SessionTags, KEY_ACTOR, KEY_CORRELATION, KEY_ROLE, KEY_STAFF_ID, KEY_SUBJECT_ID,
    KEY_SUBJECT_KIND,
};
pub use error::{ConfigError, Error, GateError, Result, RevisionError};
pub use gate::{AllowAll, DenyAll, FailClosed, PermissionGate, PolicyBackend, RolePolicy};
pub use mutation::{Change, GuardedMutation, Operation, Outcome, NOTE_OPERATION};
pub use revision::{EntityRevisionMetadata, Revisioned};
pub use sink::{AnalyticsSink, ChannelSink, MemorySink, NoopSink, TelemetryEvent, TracingSink};
