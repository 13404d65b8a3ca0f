//! Telemetry seam for gated operations.
//!
//! An [`AnalyticsSink`] receives one event per gated operation: the action
//! name on success, or the action name with a `_denied` suffix on refusal.
//! Sinks are side-effect only. They must not block the caller on an external
//! system and they swallow their own failures.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::context::OpContext;

/// Pluggable telemetry emitter.
pub trait AnalyticsSink: Send + Sync {
    /// Records `event` with its context. Must not block or panic.
    fn log(&self, event: &str, info: &OpContext);
}

/// Sink that discards everything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn log(&self, _event: &str, _info: &OpContext) {}
}

/// Sink that emits each event as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn log(&self, event: &str, info: &OpContext) {
        let fields = serde_json::to_string(info).unwrap_or_default();
        tracing::info!(
            target: "trust_center::telemetry",
            event,
            fields = %fields,
            "telemetry event"
        );
    }
}

/// One telemetry event, as forwarded by [`ChannelSink`] and kept by
/// [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Event name
    pub name: String,
    /// Event payload
    pub info: OpContext,
}

/// Sink that hands events to a consumer task over a bounded channel.
///
/// Sending never waits: when the channel is full or the receiver is gone
/// the event is dropped and counted.
///
/// # Example
///
/// ```
/// use trust_center::{AnalyticsSink, ChannelSink, OpContext};
///
/// let (sink, mut rx) = ChannelSink::new(16);
/// sink.log("addNote", &OpContext::new().with("subject_id", "ch-1"));
///
/// let event = rx.try_recv().expect("event forwarded");
/// assert_eq!(event.name, "addNote");
/// ```
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryEvent>,
    dropped: Mutex<u64>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its consumer should drain.
    ///
    /// A `buffer` of zero is raised to one.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                tx,
                dropped: Mutex::new(0),
            },
            rx,
        )
    }

    /// Returns how many events were dropped because the channel was full or
    /// closed.
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock()
    }
}

impl AnalyticsSink for ChannelSink {
    fn log(&self, event: &str, info: &OpContext) {
        let message = TelemetryEvent {
            name: event.to_string(),
            info: info.clone(),
        };
        if let Err(err) = self.tx.try_send(message) {
            *self.dropped.lock() += 1;
            tracing::trace!(
                target: "trust_center::telemetry",
                event,
                error = %err,
                "telemetry event dropped"
            );
        }
    }
}

/// In-memory sink that keeps every event, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded events.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded event names in order.
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forgets all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AnalyticsSink for MemorySink {
    fn log(&self, event: &str, info: &OpContext) {
        self.events.lock().push(TelemetryEvent {
            name: event.to_string(),
            info: info.clone(),
        });
    }
}
