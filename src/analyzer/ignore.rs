//! The ignore ruleset: which import paths the reach computation should treat as absent.
//!
//! Described in the data model as a radix tree keyed by normalized import path; this
//! implementation gets the same externally-observable behavior (exact match, `*`-suffix
//! wildcard prefix match, wildcard beats exact at the same path, a bare `*` empties the
//! ruleset) from a sorted exact-match set plus a separate sorted wildcard-prefix list —
//! the rule sets analyzers pass in are small enough that the radix tree's asymptotic
//! advantage isn't the point.

use std::collections::BTreeSet;

/// A parsed, queryable set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    exact: BTreeSet<String>,
    wildcard_prefixes: BTreeSet<String>,
    ignore_nothing: bool,
}

impl IgnoreRules {
    /// Builds a ruleset from raw rule strings. A bare `"*"` anywhere in `rules` makes the
    /// whole set ignore nothing, overriding every other entry.
    #[must_use]
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = BTreeSet::new();
        let mut wildcard_prefixes = BTreeSet::new();
        let mut ignore_nothing = false;

        for rule in rules {
            let rule = rule.as_ref().trim();
            if rule.is_empty() {
                continue;
            }
            if rule == "*" {
                ignore_nothing = true;
                continue;
            }
            if let Some(prefix) = rule.strip_suffix('*') {
                wildcard_prefixes.insert(prefix.to_string());
            } else {
                exact.insert(rule.to_string());
            }
        }

        Self { exact, wildcard_prefixes, ignore_nothing }
    }

    /// Returns true if `import_path` matches a wildcard prefix or an exact rule. Wildcard
    /// rules take precedence: an exact rule at the same path as a wildcard prefix match
    /// is redundant, never contradictory, so there's nothing to resolve, but conceptually
    /// the wildcard is checked first per the data model's stated precedence.
    #[must_use]
    pub fn is_ignored(&self, import_path: &str) -> bool {
        if self.ignore_nothing {
            return false;
        }
        if self.wildcard_prefixes.iter().any(|prefix| import_path.starts_with(prefix.as_str())) {
            return true;
        }
        self.exact.contains(import_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_rule_matches_only_that_path() {
        let rules = IgnoreRules::new(["example.com/a/internal"]);
        assert!(rules.is_ignored("example.com/a/internal"));
        assert!(!rules.is_ignored("example.com/a/internal/sub"));
    }

    #[test]
    fn wildcard_rule_matches_prefix() {
        let rules = IgnoreRules::new(["example.com/a/internal/*"]);
        assert!(rules.is_ignored("example.com/a/internal/sub"));
        assert!(rules.is_ignored("example.com/a/internal/"));
        assert!(!rules.is_ignored("example.com/a/public"));
    }

    #[test]
    fn bare_star_ignores_nothing() {
        let rules = IgnoreRules::new(["example.com/a/internal", "*"]);
        assert!(!rules.is_ignored("example.com/a/internal"));
    }

    #[test]
    fn empty_ruleset_ignores_nothing() {
        let rules = IgnoreRules::new(Vec::<String>::new());
        assert!(!rules.is_ignored("anything"));
    }
}
