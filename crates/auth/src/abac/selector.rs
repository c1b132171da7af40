//! Selector grammar shared by action and resource lists.
//!
//! A selector is `*`, an exact string, or a prefix ending in `*`. Prefix
//! matching is plain string prefix: `"hr.*"` also matches `"hr_other"`.

/// The match-everything selector.
pub const WILDCARD: &str = "*";

pub fn selector_matches(selector: &str, value: &str) -> bool {
    if selector == WILDCARD {
        return true;
    }
    match selector.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => selector == value,
    }
}

/// Does any selector in `selectors` match `value`?
pub fn any_selector_matches<S: AsRef<str>>(selectors: &[S], value: &str) -> bool {
    selectors
        .iter()
        .any(|selector| selector_matches(selector.as_ref(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefix_and_exact_selectors() {
        assert!(selector_matches("hr.leave.*", "hr.leave.read"));
        assert!(selector_matches("hr.leave.*", "hr.leave.anything"));
        assert!(selector_matches("hr.leave.read", "hr.leave.read"));
        assert!(!selector_matches("hr.leave.read", "hr.leave.readX"));
        assert!(!selector_matches("hr.leave.*", "hr.absence.read"));
    }

    #[test]
    fn prefix_is_not_segment_aware() {
        assert!(selector_matches("hr.*", "hr.people.profile"));
        assert!(selector_matches("hr*", "hr_other"));
        assert!(!selector_matches("hr.*", "hr_other"));
    }

    #[test]
    fn empty_list_matches_nothing() {
        let selectors: [&str; 0] = [];
        assert!(!any_selector_matches(&selectors, "organization"));
        assert!(any_selector_matches(&["member", "organization"], "organization"));
    }

    proptest! {
        #[test]
        fn wildcard_matches_everything(value in ".*") {
            prop_assert!(selector_matches("*", &value));
        }

        #[test]
        fn prefix_selector_matches_any_extension(prefix in "[a-z.]{1,12}", suffix in "[a-zA-Z._-]{0,12}") {
            let selector = format!("{prefix}*");
            let value = format!("{prefix}{suffix}");
            prop_assert!(selector_matches(&selector, &value));
        }

        #[test]
        fn exact_selector_matches_only_itself(selector in "[a-z.]{1,16}", extra in "[a-zA-Z]{1,4}") {
            prop_assert!(selector_matches(&selector, &selector));
            let longer = format!("{selector}{extra}");
            prop_assert!(!selector_matches(&selector, &longer));
        }
    }
}
