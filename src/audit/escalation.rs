//! Escalation classifier for audit entries.
//!
//! An entry escalates when the caller hints so, or when its operation name
//! or detail text mentions a dangerous keyword. Matching is a
//! case-insensitive substring test; the classifier holds no state besides
//! its keyword list.

/// Keywords that escalate an entry unless configured otherwise.
pub const DEFAULT_KEYWORDS: [&str; 3] = ["danger", "critical", "delete"];

/// Keyword-based escalation classifier.
///
/// # Example
///
/// ```
/// use trust_center::audit::Escalation;
///
/// let escalation = Escalation::default();
///
/// assert!(escalation.classify("deleteCharge", "", false));
/// assert!(escalation.classify("update", "CRITICAL stock level", false));
/// assert!(escalation.classify("update", "", true));
/// assert!(!escalation.classify("update", "amount 10 -> 12", false));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    keywords: Vec<String>,
}

impl Escalation {
    /// Creates a classifier over a custom keyword list.
    ///
    /// Keywords are lowercased; blank keywords are ignored since they would
    /// match every entry.
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Returns the lowercased keyword list.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Returns true if the entry should be escalated.
    pub fn classify(&self, operation: &str, detail: &str, hint: bool) -> bool {
        if hint {
            return true;
        }
        let operation = operation.to_lowercase();
        let detail = detail.to_lowercase();
        self.keywords
            .iter()
            .any(|k| operation.contains(k.as_str()) || detail.contains(k.as_str()))
    }
}

impl Default for Escalation {
    fn default() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS)
    }
}

/// Classifies with the default keyword set.
pub fn is_escalated(operation: &str, detail: &str, hint: bool) -> bool {
    Escalation::default().classify(operation, detail, hint)
}
