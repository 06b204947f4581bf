//! Property-Based Tests for Normalization & Matching
//!
//! # Test Properties
//!
//! 1. **Idempotence**: normalize(normalize(s)) = normalize(s)
//! 2. **Canonical shape**: no whitespace, no uppercase, no filler tokens left
//! 3. **Fail closed**: empty accepted sets never match
//! 4. **Self match**: a year/division pair always matches the scope built
//!    from itself, unless it normalizes to nothing

#![cfg(test)]

use std::collections::HashSet;

use proptest::prelude::*;

use super::{canonical_divisions, canonical_years, extract_leading_number, matches, normalize};

// =============================================================================
// Property Strategies
// =============================================================================

/// Free text mixing letters, digits, whitespace and filler fragments.
fn field_text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-zA-Z0-9 ]{1,6}",
            Just("Year".to_string()),
            Just("yr".to_string()),
            Just("st".to_string()),
            Just("nd".to_string()),
            Just("rd".to_string()),
            Just("th".to_string()),
            Just("Division".to_string()),
            Just("Div".to_string()),
            Just(" ".to_string()),
        ],
        0..6,
    )
    .prop_map(|parts| parts.concat())
}

/// Year labels in the shapes seen in real records.
fn year_label_strategy() -> impl Strategy<Value = (u8, String)> {
    (1u8..=6).prop_flat_map(|n| {
        let suffix = match n {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        };
        prop_oneof![
            Just((n, format!("{}", n))),
            Just((n, format!("{}{}", n, suffix))),
            Just((n, format!("{}{} Year", n, suffix))),
            Just((n, format!("Year {}", n))),
            Just((n, format!("year{}", n))),
            Just((n, format!("{} YR", n))),
        ]
    })
}

// =============================================================================
// Normalization Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_normalize_is_idempotent(s in field_text_strategy()) {
        let once = normalize(&s);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn prop_normalize_is_idempotent_for_any_string(s in ".*") {
        let once = normalize(&s);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn prop_normalize_output_is_canonical(s in field_text_strategy()) {
        let canonical = normalize(&s);
        prop_assert!(!canonical.chars().any(char::is_whitespace));
        prop_assert!(!canonical.chars().any(|c| c.is_ascii_uppercase()));
        for token in ["division", "div", "year", "yr", "st", "nd", "rd", "th"] {
            prop_assert!(!canonical.contains(token));
        }
    }

    #[test]
    fn prop_year_labels_share_a_key((n, label) in year_label_strategy()) {
        prop_assert_eq!(normalize(&label), n.to_string());
        prop_assert_eq!(extract_leading_number(&label), Some(n.to_string()));
    }

    #[test]
    fn prop_leading_number_is_digits(s in field_text_strategy()) {
        if let Some(number) = extract_leading_number(&s) {
            prop_assert!(!number.is_empty());
            prop_assert!(number.chars().all(|c| c.is_ascii_digit()));
            prop_assert!(s.contains(&number));
        }
    }
}

// =============================================================================
// Matching Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_matching_fails_closed(year in ".*", division in ".*") {
        let empty: HashSet<String> = HashSet::new();
        prop_assert!(!matches(&year, &division, &empty, &empty));
    }

    #[test]
    fn prop_matching_fails_closed_with_one_empty_set(
        year in field_text_strategy(),
        division in field_text_strategy(),
    ) {
        let empty: HashSet<String> = HashSet::new();
        let years = canonical_years([year.as_str()]);
        let divisions = canonical_divisions([division.as_str()]);

        prop_assert!(!matches(&year, &division, &years, &empty));
        prop_assert!(!matches(&year, &division, &empty, &divisions));
    }

    #[test]
    fn prop_pair_matches_its_own_scope(
        (_, year) in year_label_strategy(),
        division in "[A-Fa-f]",
    ) {
        let years = canonical_years([year.as_str()]);
        let divisions = canonical_divisions([division.as_str()]);
        prop_assert!(matches(&year, &division, &years, &divisions));
    }
}
