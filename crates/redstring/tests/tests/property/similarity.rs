//! Property tests: name similarity is a normalized, symmetric score.

use proptest::prelude::*;
use redstring_store::duplicates::similarity;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z ]{0,16}"
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

#[test]
fn reference_scores() {
    assert_eq!(similarity("Apple", "Apple"), 1.0);
    assert!(similarity("Apple", "Appel") > 0.7);
    assert!(similarity("Apple", "Banana") < 0.3);
}

proptest! {
    #[test]
    fn score_is_bounded(a in arb_name(), b in arb_name()) {
        let s = similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn score_is_symmetric(a in arb_name(), b in arb_name()) {
        prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }

    #[test]
    fn identical_up_to_case_and_padding(a in arb_name()) {
        let padded = format!("  {}  ", a.to_uppercase());
        prop_assert_eq!(similarity(&a, &padded), 1.0);
    }

    /// One substituted character costs exactly one edit.
    #[test]
    fn single_substitution(a in "[a-z]{2,12}", at in any::<prop::sample::Index>()) {
        let mut chars: Vec<char> = a.chars().collect();
        let i = at.index(chars.len());
        chars[i] = if chars[i] == 'z' { 'y' } else { 'z' };
        let b: String = chars.into_iter().collect();
        let expected = 1.0 - 1.0 / a.len() as f64;
        prop_assert!((similarity(&a, &b) - expected).abs() < 1e-9);
    }
}
