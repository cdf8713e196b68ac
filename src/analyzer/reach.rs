//! Transitive reachability over a [`PackageTree`].
//!
//! For every internal package, records the internal and external packages transitively
//! reachable from it. Implemented as a fixed-point closure over direct edges rather than
//! an explicit Tarjan SCC pass: repeatedly unioning a node's reach with each of its
//! already-discovered neighbors' reach converges to the same transitive closure a
//! recursive coloring DFS would produce, and a node that ends up reaching itself is
//! exactly a node on some import cycle — which the closure has already, for free, merged
//! with the rest of that cycle's external reach.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::ignore::IgnoreRules;
use super::package::{Entry, PackageTree};

/// The internal and external packages transitively reachable from one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reach {
    /// Internal packages transitively reachable, sorted and deduplicated.
    pub internal: Vec<String>,
    /// External packages transitively reachable, sorted and deduplicated.
    pub external: Vec<String>,
}

/// A computed reach map: one [`Reach`] per surviving internal package.
#[derive(Debug, Clone, Default)]
pub struct ReachMap {
    /// Reach entries, keyed by import path. A path absent from this map was either
    /// outside the tree, ignored, or poisoned (see [`compute`]).
    pub entries: BTreeMap<String, Reach>,
}

/// Computes the reach map for `tree`, applying `ignore` before traversal.
///
/// When `suppress_poison_propagation` is `false` (the default posture), any package that
/// transitively imports an errored package is dropped from the map entirely, and so is
/// every member of an import cycle (a package that ends up reaching itself). When `true`,
/// only directly-errored packages are dropped; cycle members keep an entry holding the
/// union of the whole cycle's reach.
#[must_use]
pub fn compute(tree: &PackageTree, ignore: &IgnoreRules, suppress_poison_propagation: bool) -> ReachMap {
    let mut direct_internal: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut direct_external: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut directly_poisoned: BTreeSet<String> = BTreeSet::new();

    for (path, entry) in &tree.entries {
        if ignore.is_ignored(path) {
            continue;
        }
        match entry {
            Entry::Package(pkg) => {
                let mut internal = BTreeSet::new();
                let mut external = BTreeSet::new();
                for import in pkg.imports.iter().chain(pkg.test_imports.iter()) {
                    if ignore.is_ignored(import) {
                        continue;
                    }
                    if tree.entries.contains_key(import) {
                        internal.insert(import.clone());
                    } else {
                        external.insert(import.clone());
                    }
                }
                direct_internal.insert(path.clone(), internal);
                direct_external.insert(path.clone(), external);
            }
            Entry::Problem(_) => {
                directly_poisoned.insert(path.clone());
            }
        }
    }

    let nodes: Vec<String> = direct_internal.keys().cloned().collect();
    let mut reach_internal = direct_internal;
    let mut reach_external = direct_external;

    let mut changed = true;
    while changed {
        changed = false;
        for node in &nodes {
            let neighbors: Vec<String> = reach_internal[node].iter().cloned().collect();
            for neighbor in neighbors {
                if directly_poisoned.contains(&neighbor) {
                    continue;
                }
                let Some(neighbor_internal) = reach_internal.get(&neighbor).cloned() else {
                    continue;
                };
                let Some(neighbor_external) = reach_external.get(&neighbor).cloned() else {
                    continue;
                };
                let entry_internal = reach_internal.get_mut(node).expect("node is always its own key");
                let before = entry_internal.len();
                entry_internal.extend(neighbor_internal);
                changed |= entry_internal.len() != before;

                let entry_external = reach_external.get_mut(node).expect("node is always its own key");
                let before = entry_external.len();
                entry_external.extend(neighbor_external);
                changed |= entry_external.len() != before;
            }
        }
    }

    let mut poisoned = directly_poisoned.clone();
    if !suppress_poison_propagation {
        for node in &nodes {
            if reach_internal[node].iter().any(|n| directly_poisoned.contains(n)) {
                poisoned.insert(node.clone());
            }
            if reach_internal[node].contains(node) {
                poisoned.insert(node.clone());
            }
        }
    }

    let mut entries = BTreeMap::new();
    for node in &nodes {
        if poisoned.contains(node) {
            continue;
        }
        let internal: Vec<String> = reach_internal[node].iter().filter(|n| !poisoned.contains(*n)).cloned().collect();
        let external: Vec<String> = reach_external[node].iter().cloned().collect();
        entries.insert(node.clone(), Reach { internal, external });
    }

    ReachMap { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::package::Package;

    fn tree_with(packages: Vec<(&str, Vec<&str>)>) -> PackageTree {
        let mut entries = BTreeMap::new();
        for (path, imports) in packages {
            entries.insert(
                path.to_string(),
                Entry::Package(Package {
                    name: path.to_string(),
                    import_path: path.to_string(),
                    canonical_comment: None,
                    imports: imports.into_iter().map(String::from).collect(),
                    test_imports: Vec::new(),
                }),
            );
        }
        PackageTree { import_root: "example.com/root".into(), entries }
    }

    #[test]
    fn simple_chain_reaches_transitively() {
        let tree = tree_with(vec![
            ("example.com/a", vec!["example.com/b"]),
            ("example.com/b", vec!["example.com/c", "fmt"]),
            ("example.com/c", vec!["os"]),
        ]);
        let ignore = IgnoreRules::new(Vec::<String>::new());
        let map = compute(&tree, &ignore, false);

        let a = &map.entries["example.com/a"];
        assert_eq!(a.internal, vec!["example.com/b".to_string(), "example.com/c".to_string()]);
        assert_eq!(a.external, vec!["fmt".to_string(), "os".to_string()]);
    }

    #[test]
    fn cycle_members_dropped_by_default() {
        let tree = tree_with(vec![
            ("example.com/a", vec!["example.com/b"]),
            ("example.com/b", vec!["example.com/a", "fmt"]),
        ]);
        let ignore = IgnoreRules::new(Vec::<String>::new());
        let map = compute(&tree, &ignore, false);
        assert!(map.entries.is_empty());
    }

    #[test]
    fn cycle_members_keep_unioned_entries_when_suppressed() {
        let tree = tree_with(vec![
            ("example.com/a", vec!["example.com/b", "os"]),
            ("example.com/b", vec!["example.com/a", "fmt"]),
        ]);
        let ignore = IgnoreRules::new(Vec::<String>::new());
        let map = compute(&tree, &ignore, true);
        let a = &map.entries["example.com/a"];
        let b = &map.entries["example.com/b"];
        assert_eq!(a.external, vec!["fmt".to_string(), "os".to_string()]);
        assert_eq!(b.external, vec!["fmt".to_string(), "os".to_string()]);
    }

    #[test]
    fn ignored_path_is_removed_from_every_reach_map() {
        let tree = tree_with(vec![
            ("example.com/a", vec!["example.com/b", "example.com/c"]),
            ("example.com/b", vec!["only-via-b"]),
            ("example.com/c", vec!["fmt"]),
        ]);
        let ignore = IgnoreRules::new(["example.com/b"]);
        let map = compute(&tree, &ignore, false);
        let a = &map.entries["example.com/a"];
        assert!(!a.internal.contains(&"example.com/b".to_string()));
        assert!(!a.external.contains(&"only-via-b".to_string()));
        assert!(a.internal.contains(&"example.com/c".to_string()));
    }

    #[test]
    fn poisoned_package_never_appears_in_any_reach_map() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "example.com/broken".to_string(),
            Entry::Problem(super::super::package::Problem::Parse { reason: "boom".into() }),
        );
        entries.insert(
            "example.com/a".to_string(),
            Entry::Package(Package {
                name: "a".into(),
                import_path: "example.com/a".into(),
                canonical_comment: None,
                imports: vec!["example.com/broken".into()],
                test_imports: Vec::new(),
            }),
        );
        let tree = PackageTree { import_root: "example.com".into(), entries };
        let ignore = IgnoreRules::new(Vec::<String>::new());
        let map = compute(&tree, &ignore, false);
        assert!(!map.entries.contains_key("example.com/a"));
        assert!(!map.entries.contains_key("example.com/broken"));
    }
}
