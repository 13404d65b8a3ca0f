//! Startup configuration and the frozen injection root.
//!
//! [`TrustCenter`] is built once, before concurrent traffic begins. It owns
//! the single permission gate, the analytics sink, the clock and the
//! per-domain ledgers, and exposes no way to swap any of them afterwards.
//! Each login obtains a [`GuardedMutation`] bound to its session tags via
//! [`TrustCenter::session`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{
    AuditLedger, Escalation, LedgerRegistry, LedgerStats, DEFAULT_CAPACITY, DEFAULT_KEYWORDS,
};
use crate::clock::{Clock, SystemClock};
use crate::context::SessionTags;
use crate::error::ConfigError;
use crate::gate::{AllowAll, FailClosed, PermissionGate, PolicyBackend};
use crate::mutation::GuardedMutation;
use crate::sink::{AnalyticsSink, NoopSink};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Tests, previews and local development
    #[default]
    Preview,
    /// Shipped configuration; preview gates are refused
    Production,
}

/// Tunables read at startup.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use trust_center::{Environment, TrustCenterConfig};
///
/// let config = TrustCenterConfig::from_json(r#"{ "ledger_capacity": 50 }"#).unwrap();
/// assert_eq!(config.ledger_capacity, 50);
/// assert_eq!(config.environment, Environment::Preview);
/// assert_eq!(config.escalation_keywords, ["danger", "critical", "delete"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustCenterConfig {
    /// Maximum entries retained per ledger
    pub ledger_capacity: usize,
    /// Deployment environment
    pub environment: Environment,
    /// Keywords that escalate an audit entry
    pub escalation_keywords: Vec<String>,
    /// Deadline for policy backend decisions, in milliseconds.
    ///
    /// Applied to backends installed with [`TrustCenterBuilder::fail_closed`].
    pub gate_deadline_ms: Option<u64>,
}

impl Default for TrustCenterConfig {
    fn default() -> Self {
        Self {
            ledger_capacity: DEFAULT_CAPACITY,
            environment: Environment::Preview,
            escalation_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            gate_deadline_ms: None,
        }
    }
}

impl TrustCenterConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] for invalid JSON and
    /// [`ConfigError::InvalidCapacity`] for a zero capacity.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that have no safe interpretation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(self.ledger_capacity));
        }
        Ok(())
    }

    /// Returns the configured gate deadline.
    ///
    /// [`TrustCenterBuilder::fail_closed`] applies it when the center is built.
    pub fn gate_deadline(&self) -> Option<Duration> {
        self.gate_deadline_ms.map(Duration::from_millis)
    }
}

type DeferredGate = Box<dyn FnOnce(Option<Duration>) -> Arc<dyn PermissionGate> + Send>;

enum GateSlot {
    Ready(Arc<dyn PermissionGate>),
    // waits for the final configuration's deadline
    Backend(DeferredGate),
}

impl GateSlot {
    fn resolve(self, deadline: Option<Duration>) -> Arc<dyn PermissionGate> {
        match self {
            GateSlot::Ready(gate) => gate,
            GateSlot::Backend(make) => make(deadline),
        }
    }
}

/// Builder for [`TrustCenter`].
pub struct TrustCenterBuilder {
    config: TrustCenterConfig,
    gate: GateSlot,
    sink: Arc<dyn AnalyticsSink>,
    clock: Arc<dyn Clock>,
}

impl TrustCenterBuilder {
    /// Replaces the configuration.
    pub fn config(mut self, config: TrustCenterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the permission gate.
    pub fn gate(mut self, gate: impl PermissionGate + 'static) -> Self {
        self.gate = GateSlot::Ready(Arc::new(gate));
        self
    }

    /// Sets an already shared permission gate.
    pub fn shared_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.gate = GateSlot::Ready(gate);
        self
    }

    /// Sets a [`FailClosed`] gate over `backend`, bounded by the configured
    /// `gate_deadline_ms` once the center is built.
    pub fn fail_closed<B: PolicyBackend + 'static>(mut self, backend: B) -> Self {
        self.gate = GateSlot::Backend(Box::new(move |deadline| -> Arc<dyn PermissionGate> {
            let gate = FailClosed::new(backend);
            match deadline {
                Some(limit) => Arc::new(gate.with_deadline(limit)),
                None => Arc::new(gate),
            }
        }));
        self
    }

    /// Sets the analytics sink.
    pub fn sink(mut self, sink: impl AnalyticsSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Sets an already shared analytics sink.
    pub fn shared_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// Fails on a zero ledger capacity, or when a preview gate is configured
    /// for [`Environment::Production`].
    pub fn build(self) -> Result<TrustCenter, ConfigError> {
        self.config.validate()?;
        let gate = self.gate.resolve(self.config.gate_deadline());
        if self.config.environment == Environment::Production && gate.is_preview() {
            return Err(ConfigError::PreviewGateInProduction {
                gate: gate.name().to_string(),
            });
        }

        let escalation = Escalation::with_keywords(&self.config.escalation_keywords);
        let ledgers = LedgerRegistry::with_parts(
            self.config.ledger_capacity,
            escalation,
            Arc::clone(&self.clock),
        );

        tracing::info!(
            target: "trust_center::config",
            gate = gate.name(),
            environment = ?self.config.environment,
            ledger_capacity = self.config.ledger_capacity,
            "trust center configured"
        );

        Ok(TrustCenter {
            inner: Arc::new(Inner {
                config: self.config,
                gate,
                sink: self.sink,
                clock: self.clock,
                ledgers,
            }),
        })
    }
}

struct Inner {
    config: TrustCenterConfig,
    gate: Arc<dyn PermissionGate>,
    sink: Arc<dyn AnalyticsSink>,
    clock: Arc<dyn Clock>,
    ledgers: LedgerRegistry,
}

/// Frozen process-wide wiring of gate, sink, clock and ledgers.
///
/// Cloning shares the same instance.
///
/// # Example
///
/// ```
/// use trust_center::{DenyAll, Environment, SessionTags, TrustCenter, TrustCenterConfig};
///
/// let config = TrustCenterConfig {
///     environment: Environment::Production,
///     ..TrustCenterConfig::default()
/// };
/// let center = TrustCenter::builder().config(config).gate(DenyAll).build().unwrap();
///
/// let guard = center.session(SessionTags::new().with_role("staff"));
/// assert_eq!(guard.session().role(), Some("staff"));
/// assert_eq!(center.ledger("charges").capacity(), 200);
/// ```
#[derive(Clone)]
pub struct TrustCenter {
    inner: Arc<Inner>,
}

impl TrustCenter {
    /// Starts a builder with the preview defaults: [`AllowAll`],
    /// [`NoopSink`], [`SystemClock`].
    pub fn builder() -> TrustCenterBuilder {
        TrustCenterBuilder {
            config: TrustCenterConfig::default(),
            gate: GateSlot::Ready(Arc::new(AllowAll)),
            sink: Arc::new(NoopSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Returns the frozen configuration.
    pub fn config(&self) -> &TrustCenterConfig {
        &self.inner.config
    }

    /// Returns the name of the configured gate.
    pub fn gate_name(&self) -> &str {
        self.inner.gate.name()
    }

    /// Returns a guard bound to one session's ambient tags.
    pub fn session(&self, tags: SessionTags) -> GuardedMutation {
        GuardedMutation::new(
            Arc::clone(&self.inner.gate),
            Arc::clone(&self.inner.sink),
            Arc::new(tags),
            Arc::clone(&self.inner.clock),
        )
    }

    /// Returns the shared ledger for `domain`.
    pub fn ledger(&self, domain: &str) -> Arc<AuditLedger> {
        self.inner.ledgers.ledger(domain)
    }

    /// Returns the ledger registry.
    pub fn ledgers(&self) -> &LedgerRegistry {
        &self.inner.ledgers
    }

    /// Returns counters for every ledger created so far.
    pub fn stats(&self) -> Vec<LedgerStats> {
        self.inner.ledgers.stats()
    }
}

impl std::fmt::Debug for TrustCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustCenter")
            .field("config", &self.inner.config)
            .field("gate", &self.inner.gate.name())
            .field("domains", &self.inner.ledgers.domains())
            .finish()
    }
}
