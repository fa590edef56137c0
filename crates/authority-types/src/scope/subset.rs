//! Conservative scope subset algebra.
//!
//! `is_subset` governs what delegation is legal: a child scope may only
//! narrow, never widen, a parent's scope. A false "yes" here is a security
//! bug; a false "no" merely refuses a legitimate delegation. The algebra
//! therefore errs toward refusal whenever containment is not provably
//! established (see DESIGN.md for the rejected, more permissive
//! independent-per-pattern alternative).

use super::glob::{matches, split_segments};

/// Does every string `child_pattern` accepts also get accepted by `parent_pattern`?
///
/// Patterns are proven contained via segment alignment rather than sampling:
/// the parent's anchored prefix/suffix must bound the child's, and every
/// interior literal segment of the parent must be locatable, in order,
/// entirely inside a single interior segment of the child (never straddling
/// one of the child's own wildcard positions) so that no instantiation of
/// the child's wildcards can produce a string the parent would reject.
pub fn pattern_contains(parent_pattern: &str, child_pattern: &str) -> bool {
    let parent_segments = split_segments(parent_pattern);
    let child_segments = split_segments(child_pattern);

    if parent_segments.len() == 1 {
        // Parent accepts exactly one string; child must accept exactly that string too.
        return child_segments.len() == 1 && child_segments[0] == parent_segments[0];
    }

    if child_segments.len() == 1 {
        // Child is a single concrete string; parent either matches it or not.
        return matches(child_segments[0], parent_pattern);
    }

    let parent_first = parent_segments[0];
    let child_first = child_segments[0];
    if !parent_first.is_empty() && (child_first.is_empty() || !child_first.starts_with(parent_first)) {
        return false;
    }

    let parent_last = *parent_segments.last().unwrap();
    let child_last = *child_segments.last().unwrap();
    if !parent_last.is_empty() && (child_last.is_empty() || !child_last.ends_with(parent_last)) {
        return false;
    }

    let parent_mid = &parent_segments[1..parent_segments.len() - 1];
    let child_mid = &child_segments[1..child_segments.len() - 1];

    let mut child_idx = 0usize;
    let mut pos_in_segment = 0usize;
    for token in parent_mid {
        if token.is_empty() {
            continue;
        }
        let mut found = false;
        while child_idx < child_mid.len() {
            if let Some(offset) = child_mid[child_idx][pos_in_segment..].find(token) {
                pos_in_segment += offset + token.len();
                found = true;
                break;
            }
            child_idx += 1;
            pos_in_segment = 0;
        }
        if !found {
            return false;
        }
    }
    true
}

/// Is every pattern in `child` contained by some pattern in `parent`?
pub fn is_resource_subset(child: &[String], parent: &[String]) -> bool {
    child.iter().all(|c| parent.iter().any(|p| pattern_contains(p, c)))
}

/// Actions carry no wildcards: exact-match set subset.
pub fn is_action_subset(child: &[String], parent: &[String]) -> bool {
    child.iter().all(|c| parent.iter().any(|p| p == c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_pattern_is_its_own_subset() {
        assert!(pattern_contains("api:openai:gpt-4", "api:openai:gpt-4"));
    }

    #[test]
    fn narrower_wildcard_is_subset_of_broader() {
        assert!(pattern_contains("api:*", "api:openai:*"));
        assert!(pattern_contains("api:*", "api:openai:gpt-4"));
    }

    #[test]
    fn broader_wildcard_is_not_subset_of_narrower() {
        assert!(!pattern_contains("api:openai:*", "api:*"));
    }

    #[test]
    fn disjoint_patterns_are_not_subsets() {
        assert!(!pattern_contains("database:*", "api:*"));
    }

    #[test]
    fn literal_parent_only_contains_itself() {
        assert!(pattern_contains("api:openai:gpt-4", "api:openai:gpt-4"));
        assert!(!pattern_contains("api:openai:gpt-4", "api:openai:*"));
    }

    #[test]
    fn interior_token_must_stay_within_a_single_child_segment() {
        // parent requires literal "mid" to appear; child's own wildcard could
        // be instantiated empty, producing a string without "mid" in it.
        assert!(!pattern_contains("a*mid*z", "a*z"));
    }

    #[test]
    fn resource_set_subset() {
        let child = v(&["api:openai:gpt-4", "api:anthropic:claude"]);
        let parent = v(&["api:*"]);
        assert!(is_resource_subset(&child, &parent));

        let child_too_wide = v(&["api:*", "database:read"]);
        assert!(!is_resource_subset(&child_too_wide, &parent));
    }

    #[test]
    fn action_set_subset_is_exact() {
        let child = v(&["read", "write"]);
        let parent = v(&["read", "write", "delete"]);
        assert!(is_action_subset(&child, &parent));

        let child_extra = v(&["read", "delete_all"]);
        assert!(!is_action_subset(&child_extra, &parent));
    }
}
