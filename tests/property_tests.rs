//! Property tests for ledger retention and escalation classification.

use proptest::prelude::*;
use trust_center::audit::{is_escalated, AuditLedger, EntryDraft, DEFAULT_KEYWORDS};

// Strings that can never contain a default keyword: every keyword needs
// either an 'e' or an 'i'.
fn arb_keyword_free() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-df-hj-zA-DF-HJ-Z0-9 _]{0,24}").unwrap()
}

fn arb_cased_keyword() -> impl Strategy<Value = String> {
    (prop::sample::select(DEFAULT_KEYWORDS.to_vec()), prop::collection::vec(any::<bool>(), 8))
        .prop_map(|(keyword, upper)| {
            keyword
                .chars()
                .zip(upper.into_iter().cycle())
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                .collect()
        })
}

proptest! {
    /// The ledger never holds more than its capacity, at any point.
    #[test]
    fn proptest_len_never_exceeds_capacity(capacity in 1usize..32, count in 0usize..128) {
        let ledger = AuditLedger::new("prop", capacity);
        for i in 0..count {
            ledger.record(EntryDraft::new("tick", format!("s-{i}")));
            prop_assert!(ledger.len() <= capacity);
        }
        prop_assert_eq!(ledger.len(), count.min(capacity));
    }

    /// Retained entries are exactly the newest `capacity` records, oldest first.
    #[test]
    fn proptest_fifo_keeps_newest(capacity in 1usize..16, count in 0usize..64) {
        let ledger = AuditLedger::new("prop", capacity);
        for i in 0..count {
            ledger.record(EntryDraft::new("tick", i.to_string()));
        }

        let kept: Vec<String> = ledger
            .snapshot()
            .iter()
            .map(|e| e.subject_id().to_string())
            .collect();
        let expected: Vec<String> = (count.saturating_sub(capacity)..count)
            .map(|i| i.to_string())
            .collect();
        prop_assert_eq!(kept, expected);
    }

    /// `recent(n)` is the tail of the retained entries in arrival order.
    #[test]
    fn proptest_recent_is_a_tail(count in 0usize..40, n in 0usize..60) {
        let ledger = AuditLedger::new("prop", 25);
        for i in 0..count {
            ledger.record(EntryDraft::new("tick", i.to_string()));
        }

        let all = ledger.snapshot();
        let recent = ledger.recent(n);
        prop_assert_eq!(recent.len(), n.min(all.len()));
        prop_assert_eq!(&all[all.len() - recent.len()..], &recent[..]);
    }

    #[test]
    fn proptest_hint_always_escalates(op in ".{0,20}", detail in ".{0,40}") {
        prop_assert!(is_escalated(&op, &detail, true));
    }

    #[test]
    fn proptest_keyword_free_entries_are_not_escalated(
        op in arb_keyword_free(),
        detail in arb_keyword_free(),
    ) {
        prop_assert!(!is_escalated(&op, &detail, false));
    }

    /// Keywords match regardless of case or position.
    #[test]
    fn proptest_keyword_escalates_in_any_case(
        keyword in arb_cased_keyword(),
        prefix in arb_keyword_free(),
        suffix in arb_keyword_free(),
        in_detail in any::<bool>(),
    ) {
        let text = format!("{prefix}{keyword}{suffix}");
        let escalated = if in_detail {
            is_escalated("update", &text, false)
        } else {
            is_escalated(&text, "", false)
        };
        prop_assert!(escalated);
    }
}
