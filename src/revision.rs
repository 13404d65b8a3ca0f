//! Per-entity creation and modification provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RevisionError;

/// Creation and modification bookkeeping carried by every guarded entity.
///
/// `created_by` is fixed at construction. `last_modified` only moves
/// forward: [`touch`](Self::touch) rejects an earlier timestamp and
/// [`advance`](Self::advance) clamps it. Fields are private so that the
/// only writers are these two methods.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use trust_center::EntityRevisionMetadata;
///
/// let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
/// let mut rev = EntityRevisionMetadata::new(Some("staff-1".into()), t0);
///
/// // An earlier timestamp is clamped, not applied.
/// rev.advance(t0 - Duration::hours(1), Some("staff-2".into()));
/// assert_eq!(rev.last_modified(), t0);
/// assert_eq!(rev.last_modified_by(), Some("staff-2"));
/// assert_eq!(rev.created_by(), Some("staff-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRevisionMetadata {
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    last_modified_by: Option<String>,
}

impl EntityRevisionMetadata {
    /// Creates metadata for an entity constructed at `at` by `created_by`.
    pub fn new(created_by: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            last_modified_by: created_by.clone(),
            created_by,
            created_at: at,
            last_modified: at,
        }
    }

    /// Returns who created the entity.
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Returns when the entity was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the time of the last successful mutation.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Returns who performed the last successful mutation.
    pub fn last_modified_by(&self) -> Option<&str> {
        self.last_modified_by.as_deref()
    }

    /// Records a modification at exactly `at`.
    ///
    /// # Errors
    ///
    /// Returns [`RevisionError::Regressed`] and leaves the metadata unchanged
    /// if `at` is earlier than the current `last_modified`.
    pub fn touch(&mut self, at: DateTime<Utc>, by: Option<String>) -> Result<(), RevisionError> {
        if at < self.last_modified {
            return Err(RevisionError::Regressed {
                current: self.last_modified,
                attempted: at,
            });
        }
        self.last_modified = at;
        self.last_modified_by = by;
        Ok(())
    }

    /// Records a modification at `at`, clamped so `last_modified` never
    /// moves backwards. Returns the timestamp actually stored.
    pub fn advance(&mut self, at: DateTime<Utc>, by: Option<String>) -> DateTime<Utc> {
        if at < self.last_modified {
            tracing::debug!(
                target: "trust_center::revision",
                current = %self.last_modified,
                attempted = %at,
                "clock regression clamped"
            );
        }
        self.last_modified = self.last_modified.max(at);
        self.last_modified_by = by;
        self.last_modified
    }
}

/// Entity that can be driven through a guarded mutation.
pub trait Revisioned {
    /// Kind label recorded in audit entries (e.g. `"charge"`).
    fn subject_kind(&self) -> &'static str;

    /// Stable identifier of this entity.
    fn subject_id(&self) -> String;

    /// Read access to the revision metadata.
    fn revision(&self) -> &EntityRevisionMetadata;

    /// Write access to the revision metadata.
    ///
    /// Only the allow branch of a guarded mutation should call this.
    fn revision_mut(&mut self) -> &mut EntityRevisionMetadata;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn new_metadata_starts_at_creation() {
        let rev = EntityRevisionMetadata::new(Some("owner".into()), t0());

        assert_eq!(rev.created_by(), Some("owner"));
        assert_eq!(rev.created_at(), t0());
        assert_eq!(rev.last_modified(), t0());
        assert_eq!(rev.last_modified_by(), Some("owner"));
    }

    #[test]
    fn touch_moves_forward() {
        let mut rev = EntityRevisionMetadata::new(None, t0());
        let later = t0() + Duration::minutes(1);

        rev.touch(later, Some("staff-9".into())).unwrap();

        assert_eq!(rev.last_modified(), later);
        assert_eq!(rev.last_modified_by(), Some("staff-9"));
        assert_eq!(rev.created_by(), None);
    }

    #[test]
    fn touch_accepts_equal_timestamp() {
        let mut rev = EntityRevisionMetadata::new(None, t0());
        assert!(rev.touch(t0(), Some("a".into())).is_ok());
    }

    #[test]
    fn touch_rejects_regression_without_side_effects() {
        let mut rev = EntityRevisionMetadata::new(Some("owner".into()), t0());
        let earlier = t0() - Duration::seconds(1);

        let err = rev.touch(earlier, Some("intruder".into())).unwrap_err();

        assert_eq!(
            err,
            RevisionError::Regressed {
                current: t0(),
                attempted: earlier
            }
        );
        assert_eq!(rev.last_modified(), t0());
        assert_eq!(rev.last_modified_by(), Some("owner"));
    }

    #[test]
    fn advance_clamps_regression() {
        let mut rev = EntityRevisionMetadata::new(None, t0());
        let stored = rev.advance(t0() - Duration::hours(2), Some("bg".into()));

        assert_eq!(stored, t0());
        assert_eq!(rev.last_modified(), t0());
        assert_eq!(rev.last_modified_by(), Some("bg"));
    }

    #[test]
    fn created_by_survives_modifications() {
        let mut rev = EntityRevisionMetadata::new(Some("owner".into()), t0());
        rev.advance(t0() + Duration::minutes(1), Some("a".into()));
        rev.advance(t0() + Duration::minutes(2), Some("b".into()));

        assert_eq!(rev.created_by(), Some("owner"));
        assert_eq!(rev.last_modified_by(), Some("b"));
    }
}
