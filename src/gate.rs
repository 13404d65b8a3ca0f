//! Authorization seam for mutating operations.
//!
//! A [`PermissionGate`] decides whether a named action may proceed given its
//! [`OpContext`]. Decisions may suspend (a remote policy lookup, for
//! instance); callers always await the verdict before touching state.
//!
//! Exactly one gate is configured per process and frozen inside
//! [`TrustCenter`](crate::TrustCenter). Implementations provided here:
//!
//! - [`AllowAll`]: preview and test only, rejected in production
//! - [`DenyAll`]: refuses everything
//! - [`RolePolicy`]: static action-to-role table
//! - [`FailClosed`]: adapts a fallible [`PolicyBackend`], denying on any error

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::context::{OpContext, KEY_ROLE};
use crate::error::GateError;

/// Pluggable authorization check.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use trust_center::{OpContext, PermissionGate};
///
/// struct BusinessHoursOnly;
///
/// #[async_trait]
/// impl PermissionGate for BusinessHoursOnly {
///     async fn permission(&self, action: &str, _ctx: &OpContext) -> bool {
///         action != "deleteCharge"
///     }
/// }
/// ```
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Returns true if `action` may proceed.
    async fn permission(&self, action: &str, context: &OpContext) -> bool;

    /// Name used in diagnostics and configuration errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// True for gates that must never ship in a production configuration.
    fn is_preview(&self) -> bool {
        false
    }
}

/// Gate that allows every action.
///
/// For tests and previews only. [`TrustCenter`](crate::TrustCenter) refuses
/// to build a production configuration around it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionGate for AllowAll {
    async fn permission(&self, _action: &str, _context: &OpContext) -> bool {
        true
    }

    fn name(&self) -> &str {
        "allow_all"
    }

    fn is_preview(&self) -> bool {
        true
    }
}

/// Gate that denies every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl PermissionGate for DenyAll {
    async fn permission(&self, _action: &str, _context: &OpContext) -> bool {
        false
    }

    fn name(&self) -> &str {
        "deny_all"
    }
}

/// Static table mapping actions to the session roles allowed to run them.
///
/// The role is read from the `role` key of the operation context. Actions
/// with no rule, and contexts with no role, are denied.
///
/// # Example
///
/// ```
/// use trust_center::{OpContext, PermissionGate, RolePolicy};
///
/// let policy = RolePolicy::new()
///     .allow("refundCharge", ["owner", "manager"])
///     .allow("addNote", ["owner", "manager", "staff"]);
///
/// let ctx = OpContext::new().with("role", "staff");
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// assert!(policy.permission("addNote", &ctx).await);
/// assert!(!policy.permission("refundCharge", &ctx).await);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    rules: HashMap<String, HashSet<String>>,
}

impl RolePolicy {
    /// Creates a policy with no rules (denies everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `roles` to perform `action`, extending any existing rule.
    pub fn allow<I, S>(mut self, action: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .entry(action.into())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
        self
    }

    /// Returns true if `role` may perform `action`.
    pub fn permits(&self, action: &str, role: &str) -> bool {
        self.rules
            .get(action)
            .is_some_and(|roles| roles.contains(role))
    }
}

#[async_trait]
impl PermissionGate for RolePolicy {
    async fn permission(&self, action: &str, context: &OpContext) -> bool {
        match context.get_str(KEY_ROLE) {
            Some(role) => self.permits(action, role),
            None => {
                tracing::debug!(target: "trust_center::gate", action, "no role in context");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "role_policy"
    }
}

/// Fallible source of policy decisions, such as a remote authorization
/// service.
#[async_trait]
pub trait PolicyBackend: Send + Sync {
    /// Evaluates `action`. Errors mean no decision could be made.
    async fn evaluate(&self, action: &str, context: &OpContext) -> Result<bool, GateError>;
}

/// Gate that adapts a [`PolicyBackend`] and resolves every failure to deny.
///
/// An optional deadline bounds how long a decision may take; a backend that
/// misses it is treated like an unreachable one.
pub struct FailClosed<B> {
    backend: B,
    deadline: Option<Duration>,
}

impl<B: PolicyBackend> FailClosed<B> {
    /// Wraps `backend` with no deadline.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            deadline: None,
        }
    }

    /// Sets the decision deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the configured deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    async fn decide(&self, action: &str, context: &OpContext) -> Result<bool, GateError> {
        match self.deadline {
            Some(limit) => {
                match tokio::time::timeout(limit, self.backend.evaluate(action, context)).await {
                    Ok(result) => result,
                    Err(_) => Err(GateError::DeadlineExceeded(
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    )),
                }
            }
            None => self.backend.evaluate(action, context).await,
        }
    }
}

#[async_trait]
impl<B: PolicyBackend> PermissionGate for FailClosed<B> {
    async fn permission(&self, action: &str, context: &OpContext) -> bool {
        match self.decide(action, context).await {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(
                    target: "trust_center::gate",
                    action,
                    error = %err,
                    "policy backend failed, denying"
                );
                false
            }
        }
    }

    fn name(&self) -> &str {
        "fail_closed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Result<bool, GateError>);

    #[async_trait]
    impl PolicyBackend for Scripted {
        async fn evaluate(&self, _action: &str, _ctx: &OpContext) -> Result<bool, GateError> {
            self.0.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl PolicyBackend for Slow {
        async fn evaluate(&self, _action: &str, _ctx: &OpContext) -> Result<bool, GateError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn allow_all_allows_and_is_preview() {
        let gate = AllowAll;
        assert!(gate.permission("deleteCharge", &OpContext::new()).await);
        assert!(gate.is_preview());
    }

    #[tokio::test]
    async fn deny_all_denies_and_is_not_preview() {
        let gate = DenyAll;
        assert!(!gate.permission("addNote", &OpContext::new()).await);
        assert!(!gate.is_preview());
    }

    #[tokio::test]
    async fn role_policy_checks_role_membership() {
        let policy = RolePolicy::new()
            .allow("refundCharge", ["owner"])
            .allow("refundCharge", ["manager"]);

        let manager = OpContext::new().with(KEY_ROLE, "manager");
        let staff = OpContext::new().with(KEY_ROLE, "staff");

        assert!(policy.permission("refundCharge", &manager).await);
        assert!(!policy.permission("refundCharge", &staff).await);
    }

    #[tokio::test]
    async fn role_policy_denies_unknown_action_and_missing_role() {
        let policy = RolePolicy::new().allow("addNote", ["staff"]);

        let staff = OpContext::new().with(KEY_ROLE, "staff");
        assert!(!policy.permission("resetAccount", &staff).await);
        assert!(!policy.permission("addNote", &OpContext::new()).await);
    }

    #[tokio::test]
    async fn fail_closed_passes_through_decisions() {
        let allow = FailClosed::new(Scripted(Ok(true)));
        let deny = FailClosed::new(Scripted(Ok(false)));

        assert!(allow.permission("x", &OpContext::new()).await);
        assert!(!deny.permission("x", &OpContext::new()).await);
    }

    #[tokio::test]
    async fn fail_closed_denies_on_backend_error() {
        let gate = FailClosed::new(Scripted(Err(GateError::Unavailable(
            "connection refused".into(),
        ))));
        assert!(!gate.permission("x", &OpContext::new()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_closed_denies_after_deadline() {
        let gate = FailClosed::new(Slow).with_deadline(Duration::from_millis(250));
        assert_eq!(gate.deadline(), Some(Duration::from_millis(250)));
        assert!(!gate.permission("x", &OpContext::new()).await);
    }

    #[test]
    fn gate_names() {
        assert_eq!(AllowAll.name(), "allow_all");
        assert_eq!(DenyAll.name(), "deny_all");
        assert_eq!(RolePolicy::new().name(), "role_policy");
    }
}
