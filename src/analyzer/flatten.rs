//! Turning a [`ReachMap`] into the flat external-import lists callers actually want.

use std::collections::BTreeSet;

use super::reach::ReachMap;

/// Returns every external import reachable from any package in `map`, sorted and
/// deduplicated, excluding entries for which `is_excluded` returns true (typically "is
/// this a standard-library path").
#[must_use]
pub fn flatten_external(map: &ReachMap, is_excluded: impl Fn(&str) -> bool) -> Vec<String> {
    let mut all: BTreeSet<String> = BTreeSet::new();
    for reach in map.entries.values() {
        for external in &reach.external {
            if !is_excluded(external) {
                all.insert(external.clone());
            }
        }
    }
    all.into_iter().collect()
}

/// Like [`flatten_external`], but additionally ignores entries whose own import path
/// contains a disallowed element (a leading `.`, a leading `_`, or a `testdata` path
/// segment) as a *source* of externals. Such packages remain valid when imported *from*
/// elsewhere — they're just not treated as roots to flatten reach from, matching build
/// tools' convention of excluding test fixtures and private packages from a project's own
/// declared external surface.
#[must_use]
pub fn flatten_external_from_buildable_sources(map: &ReachMap, is_excluded: impl Fn(&str) -> bool) -> Vec<String> {
    let mut all: BTreeSet<String> = BTreeSet::new();
    for (path, reach) in &map.entries {
        if has_disallowed_source_element(path) {
            continue;
        }
        for external in &reach.external {
            if !is_excluded(external) {
                all.insert(external.clone());
            }
        }
    }
    all.into_iter().collect()
}

fn has_disallowed_source_element(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.') || segment.starts_with('_') || segment == "testdata")
}

/// A heuristic for "is this import satisfied by the ecosystem's standard library":
/// an import path whose first path segment contains a dot is taken to name a hosted
/// domain, and anything else is assumed to be a standard-library path. This crate owns
/// no ecosystem registry of its own — import-path-deduction heuristics beyond the
/// source-deduction interface are out of scope — so this convention, shared by the
/// solver's root-reach flattening and [`crate::core::default_analyzer::GoImportAnalyzer`]
/// — is as far as it goes.
#[must_use]
pub fn is_probably_stdlib(import_path: &str) -> bool {
    !import_path.split('/').next().unwrap_or(import_path).contains('.')
}

#[cfg(test)]
mod stdlib_heuristic_tests {
    use super::is_probably_stdlib;

    #[test]
    fn dotted_first_segment_is_not_stdlib() {
        assert!(!is_probably_stdlib("example.com/foo/bar"));
    }

    #[test]
    fn plain_first_segment_is_stdlib() {
        assert!(is_probably_stdlib("fmt"));
        assert!(is_probably_stdlib("net/http"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::reach::Reach;
    use std::collections::BTreeMap;

    fn map_with(entries: Vec<(&str, Vec<&str>)>) -> ReachMap {
        let mut m = BTreeMap::new();
        for (path, externals) in entries {
            m.insert(path.to_string(), Reach { internal: Vec::new(), external: externals.into_iter().map(String::from).collect() });
        }
        ReachMap { entries: m }
    }

    #[test]
    fn flatten_sorts_dedupes_and_filters() {
        let map = map_with(vec![("a", vec!["fmt", "example.com/x"]), ("b", vec!["os", "example.com/x"])]);
        let flat = flatten_external(&map, |p| p == "fmt" || p == "os");
        assert_eq!(flat, vec!["example.com/x".to_string()]);
    }

    #[test]
    fn disallowed_sources_excluded_but_remain_valid_targets() {
        let map = map_with(vec![
            ("example.com/a/testdata", vec!["example.com/only-from-testdata"]),
            ("example.com/a", vec!["example.com/shared"]),
        ]);
        let flat = flatten_external_from_buildable_sources(&map, |_| false);
        assert!(!flat.contains(&"example.com/only-from-testdata".to_string()));
        assert!(flat.contains(&"example.com/shared".to_string()));
    }
}
