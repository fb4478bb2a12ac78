//! Removal of bracketed predicates that do not take part in matching.
//!
//! Index predicates (`[3]`, `[1,2]`, `[*]`) always survive. Everything else
//! is either a selection suffix or a computed predicate such as
//! `[@name='x']` or `[length(@name)=3]`, which a path matcher cannot honor.

use lazy_static::lazy_static;
use regex::{Captures, Regex, Replacer};

lazy_static! {
    // Group 1 captures the predicates to drop. A trailing bracket without
    // operators is a selection suffix and is kept.
    static ref UNUSED_PREDICATE: Regex = Regex::new(
        r#"\[(?:(?:\d+(?:,\d+)*)|\*)\]|(?:\[[^\]+\-*=!><'"\s]+\])$|(\[[^\]]+\])"#
    )
    .unwrap();
    static ref NON_INDEX_PREDICATE: Regex =
        Regex::new(r"\[(?:(?:\d+(?:,\d+)*)|\*)\]|(\[[^\]]+\])").unwrap();
}

/// Keeps every match except those that captured group 1.
struct PredicateFilter;

impl Replacer for PredicateFilter {
    fn replace_append(&mut self, captures: &Captures<'_>, destination: &mut String) {
        if captures.get(1).is_none() {
            destination.push_str(&captures[0]);
        }
    }
}

/// Remove predicates that cannot affect which node is matched, keeping
/// indexes and a trailing selection suffix.
///
/// ```rust
/// use fedstore_path_expr::remove_unused_predicates;
///
/// assert_eq!(remove_unused_predicates("/a/b[-1]/c"), "/a/b/c");
/// assert_eq!(remove_unused_predicates("/a/b[3][@name='x']/c"), "/a/b[3]/c");
/// assert_eq!(remove_unused_predicates("/a/b/c[@title]"), "/a/b/c[@title]");
/// ```
pub fn remove_unused_predicates(expression: &str) -> String {
    UNUSED_PREDICATE
        .replace_all(expression, PredicateFilter)
        .into_owned()
}

/// Remove every predicate except same-name-sibling indexes.
///
/// ```rust
/// use fedstore_path_expr::remove_all_predicates_except_indexes;
///
/// assert_eq!(remove_all_predicates_except_indexes("/a/b/c[@title]"), "/a/b/c");
/// assert_eq!(remove_all_predicates_except_indexes("/a/b[*]/c"), "/a/b[*]/c");
/// ```
pub fn remove_all_predicates_except_indexes(expression: &str) -> String {
    NON_INDEX_PREDICATE
        .replace_all(expression, PredicateFilter)
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_used_predicates() {
        for expr in [
            "/a/b/c",
            "/a/b[0]/c",
            "/a/b[1]/c",
            "/a/b[1000]/c",
            "/a/b[]/c",
            "/a/b[*]/c",
            "/a/b[1,2]/c",
            "/a/b[1,2,3,4,5]/c",
            "/a/b/c[@title]",
            "/a/b/c[d/e/@title]",
            "/a/(b/c)[(d|e)/(f|g)/@something]",
            "/*",
            "/*[]",
            "/*[3]",
            "/a/b[1][2][3]/c",
        ] {
            assert_eq!(remove_unused_predicates(expr), expr);
        }
    }

    #[test]
    fn removes_unused_predicates() {
        assert_eq!(remove_unused_predicates("/a/b[-1]/c"), "/a/b/c");
        assert_eq!(remove_unused_predicates("/a/b[@name='wacky']/c"), "/a/b/c");
        assert_eq!(
            remove_unused_predicates("/a/b[3][@name='wacky']/c"),
            "/a/b[3]/c"
        );
        assert_eq!(remove_unused_predicates("/a/b[3][@name]/c"), "/a/b[3]/c");
        assert_eq!(
            remove_unused_predicates("/a/b[length(@name)=3]/c"),
            "/a/b/c"
        );
    }

    #[test]
    fn trailing_computed_predicate_is_removed() {
        assert_eq!(remove_unused_predicates("/a/b[@name='x']"), "/a/b");
        assert_eq!(remove_unused_predicates("/a/b[-1]"), "/a/b");
    }

    #[test]
    fn removes_everything_but_indexes() {
        assert_eq!(remove_all_predicates_except_indexes("/a/b/c"), "/a/b/c");
        assert_eq!(
            remove_all_predicates_except_indexes("/a/b[0]/c"),
            "/a/b[0]/c"
        );
        assert_eq!(
            remove_all_predicates_except_indexes("/a/b[100]/c"),
            "/a/b[100]/c"
        );
        assert_eq!(remove_all_predicates_except_indexes("/a/b[]/c"), "/a/b[]/c");
        assert_eq!(
            remove_all_predicates_except_indexes("/a/b[1][2][3]/c"),
            "/a/b[1][2][3]/c"
        );
        assert_eq!(remove_all_predicates_except_indexes("/a/b/c[@title]"), "/a/b/c");
        assert_eq!(remove_all_predicates_except_indexes("/a/b[-1]/c"), "/a/b/c");
        assert_eq!(
            remove_all_predicates_except_indexes("/a/b[3][@name='wacky']/c"),
            "/a/b[3]/c"
        );
        assert_eq!(
            remove_all_predicates_except_indexes("/a/b[length(@name)=3]/c"),
            "/a/b/c"
        );
    }
}
