//! Property tests for cache-key canonicalization.

use proptest::prelude::*;

use parity_guard::cache::{fingerprint_plan, fingerprint_request};
use parity_guard::core::{KeySpec, PlanHints, RuleKind, TableRef, ValidationPlan};

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_map(|s| s)
}

fn table_ref() -> impl Strategy<Value = TableRef> {
    (identifier(), identifier())
        .prop_map(|(db, table)| format!("{db}.{table}").parse().unwrap())
}

proptest! {
    /// Key column order never changes the fingerprint.
    #[test]
    fn key_order_is_canonicalized(
        table in table_ref(),
        mut columns in prop::collection::vec(identifier(), 1..4),
    ) {
        columns.sort();
        columns.dedup();

        let forward = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table.clone()])
            .with_keys(KeySpec::new(columns.clone()).unwrap());
        let mut reversed_cols = columns.clone();
        reversed_cols.reverse();
        let reversed = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table])
            .with_keys(KeySpec::new(reversed_cols).unwrap());

        prop_assert_eq!(fingerprint_plan(&forward), fingerprint_plan(&reversed));
    }

    /// Table order never changes the fingerprint of order-independent rules.
    #[test]
    fn row_count_table_order_is_canonicalized(a in table_ref(), b in table_ref()) {
        let forward = ValidationPlan::new(RuleKind::RowCount, vec![a.clone(), b.clone()]);
        let swapped = ValidationPlan::new(RuleKind::RowCount, vec![b, a]);
        prop_assert_eq!(fingerprint_plan(&forward), fingerprint_plan(&swapped));
    }

    /// Case and whitespace in request text never change the fingerprint.
    #[test]
    fn request_text_is_normalized(
        words in prop::collection::vec("[a-zA-Z]{1,8}", 1..6),
        pads in prop::collection::vec(1usize..4, 0..6),
    ) {
        let plain = words.join(" ").to_lowercase();

        let mut noisy = String::from("  ");
        for (i, word) in words.iter().enumerate() {
            let pad = pads.get(i).copied().unwrap_or(1);
            noisy.push_str(&word.to_uppercase());
            noisy.push_str(&" ".repeat(pad));
        }

        let hints = PlanHints::default();
        prop_assert_eq!(
            fingerprint_request(&plain, &hints),
            fingerprint_request(&noisy, &hints)
        );
    }

    /// Distinct request texts produce distinct fingerprints.
    #[test]
    fn distinct_requests_do_not_collide(a in "[a-z ]{1,30}", b in "[a-z ]{1,30}") {
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        prop_assume!(normalize(&a) != normalize(&b));

        let hints = PlanHints::default();
        prop_assert_ne!(fingerprint_request(&a, &hints), fingerprint_request(&b, &hints));
    }
}
