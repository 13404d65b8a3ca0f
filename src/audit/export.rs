//! JSON export of audit entries.
//!
//! Exports never fail outward: an empty input or a serialization error
//! yields `None`, and the error is logged.

use super::entry::AuditEntry;

/// Serializes one entry as a pretty-printed JSON object.
pub fn entry_to_json(entry: &AuditEntry) -> Option<String> {
    match serde_json::to_string_pretty(entry) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!(target: "trust_center::audit", error = %err, "audit export failed");
            None
        }
    }
}

/// Serializes entries as a pretty-printed JSON array, or `None` when there
/// is nothing to export.
pub fn entries_to_json(entries: &[AuditEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    match serde_json::to_string_pretty(entries) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!(
                target: "trust_center::audit",
                error = %err,
                count = entries.len(),
                "audit export failed"
            );
            None
        }
    }
}

/// Parses an object produced by `export_last`.
pub fn parse_export(json: &str) -> Result<AuditEntry, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parses an array produced by `export_all`.
pub fn parse_export_all(json: &str) -> Result<Vec<AuditEntry>, serde_json::Error> {
    serde_json::from_str(json)
}
