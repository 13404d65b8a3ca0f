use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while configuring or driving the trust center.
///
/// Audit recording, telemetry emission and export never surface errors to
/// callers; these variants cover configuration and explicit bookkeeping
/// calls only.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration was rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Revision metadata refused an update
    #[error("revision error: {0}")]
    Revision(#[from] RevisionError),

    /// A policy backend failed to produce a decision
    #[error("gate error: {0}")]
    Gate(#[from] GateError),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration rejected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Ledgers must be able to retain at least one entry
    #[error("ledger capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// The allow-all preview gate may not ship in production
    #[error("preview gate '{gate}' is not allowed in a production environment")]
    PreviewGateInProduction {
        /// Name reported by the offending gate
        gate: String,
    },

    /// Configuration document could not be parsed
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Revision metadata refused an update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    /// `lastModified` may only advance forward
    #[error("last modified would regress from {current} to {attempted}")]
    Regressed {
        /// Value currently stored
        current: DateTime<Utc>,
        /// Value that was rejected
        attempted: DateTime<Utc>,
    },
}

/// Failure inside a policy backend.
///
/// Gates never propagate these: [`FailClosed`](crate::FailClosed) turns every
/// variant into a deny decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The backend could not be reached
    #[error("policy backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something that is not a decision
    #[error("policy backend returned an invalid response: {0}")]
    InvalidResponse(String),

    /// The backend did not answer within the configured deadline
    #[error("policy backend did not answer within {0} ms")]
    DeadlineExceeded(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn config_error_converts_into_error() {
        let err: Error = ConfigError::InvalidCapacity(0).into();
        assert!(matches!(err, Error::Config(ConfigError::InvalidCapacity(0))));
        assert_eq!(
            err.to_string(),
            "configuration error: ledger capacity must be at least 1, got 0"
        );
    }

    #[test]
    fn revision_error_mentions_both_timestamps() {
        let current = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        let attempted = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let err = RevisionError::Regressed { current, attempted };

        let msg = err.to_string();
        assert!(msg.contains("2024-05-02"));
        assert!(msg.contains("2024-05-01"));
    }

    #[test]
    fn gate_error_display() {
        assert_eq!(
            GateError::DeadlineExceeded(250).to_string(),
            "policy backend did not answer within 250 ms"
        );
    }
}
