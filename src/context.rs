//! Operation context and ambient session tags.
//!
//! Every gated operation carries an [`OpContext`]: a small string-keyed map of
//! JSON values that is handed to the permission gate, forwarded to the
//! analytics sink, and partially folded into audit entries.
//!
//! [`SessionTags`] hold the ambient values supplied once at login (role,
//! staff identifier, correlation label). They are immutable after
//! construction and shared as `Arc<SessionTags>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Context key for the entity identifier.
pub const KEY_SUBJECT_ID: &str = "subject_id";
/// Context key for the entity kind.
pub const KEY_SUBJECT_KIND: &str = "subject_kind";
/// Context key for the acting principal.
pub const KEY_ACTOR: &str = "actor";
/// Context key for the session role.
pub const KEY_ROLE: &str = "role";
/// Context key for the session staff identifier.
pub const KEY_STAFF_ID: &str = "staff_id";
/// Context key for the session correlation label.
pub const KEY_CORRELATION: &str = "correlation";

/// String-keyed map describing one operation.
///
/// Keys are ordered so that telemetry and debug output are deterministic.
///
/// # Example
///
/// ```
/// use trust_center::OpContext;
///
/// let ctx = OpContext::new()
///     .with("subject_id", "ch-1")
///     .with("amount_cents", 1250);
///
/// assert_eq!(ctx.get_str("subject_id"), Some("ch-1"));
/// assert_eq!(ctx.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpContext {
    fields: BTreeMap<String, Value>,
}

impl OpContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under the same key.
    ///
    /// Values that cannot be represented as JSON are skipped.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the value under `key` if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Copies every field of `other` into this context, `other` winning on
    /// key collisions.
    pub fn merge(&mut self, other: &OpContext) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// Returns a new context holding `self` overlaid with `other`.
    pub fn union(&self, other: &OpContext) -> OpContext {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the context holds no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for OpContext {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ambient tags supplied once per session by the login component.
///
/// Tags are read, never mutated, when audit entries are built. A new login
/// produces a new value.
///
/// # Example
///
/// ```
/// use trust_center::SessionTags;
///
/// let tags = SessionTags::new()
///     .with_role("manager")
///     .with_staff_id("staff-7")
///     .with_correlation("shift-am");
///
/// assert_eq!(tags.role(), Some("manager"));
/// assert_eq!(tags.staff_id(), Some("staff-7"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTags {
    role: Option<String>,
    staff_id: Option<String>,
    correlation: Option<String>,
}

impl SessionTags {
    /// Creates an empty tag set (anonymous session).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the staff identifier.
    pub fn with_staff_id(mut self, staff_id: impl Into<String>) -> Self {
        self.staff_id = Some(staff_id.into());
        self
    }

    /// Sets the correlation label.
    pub fn with_correlation(mut self, label: impl Into<String>) -> Self {
        self.correlation = Some(label.into());
        self
    }

    /// Returns the session role.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the staff identifier.
    pub fn staff_id(&self) -> Option<&str> {
        self.staff_id.as_deref()
    }

    /// Returns the correlation label.
    pub fn correlation(&self) -> Option<&str> {
        self.correlation.as_deref()
    }

    /// Writes the present tags into `ctx` under the well-known keys.
    pub fn apply_to(&self, ctx: &mut OpContext) {
        if let Some(role) = &self.role {
            ctx.insert(KEY_ROLE, role);
        }
        if let Some(staff_id) = &self.staff_id {
            ctx.insert(KEY_STAFF_ID, staff_id);
        }
        if let Some(correlation) = &self.correlation {
            ctx.insert(KEY_CORRELATION, correlation);
        }
    }
}
