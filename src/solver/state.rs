//! Pure, synchronous pieces of the solver: the bits that don't touch the source manager
//! and so are cheap to unit test in isolation from the backtracking loop itself.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::analyzer::{self, IgnoreRules, PackageTree};
use crate::core::error::{ResolverError, Result};
use crate::manifest::Manifest;
use crate::source::{CandidateVersion, SourceRef};
use crate::version::{Constraint, Version};

/// One project waiting to be visited: a root plus every package demanded of it so far.
#[derive(Debug, Clone)]
pub(super) struct PendingAtom {
    pub root: String,
    pub source_override: Option<String>,
    pub demanded: BTreeSet<String>,
    pub resume: Option<ResumeState>,
}

/// Carries a frame's already-fetched candidate list and search position across a
/// backtrack, so retrying a project never re-lists its versions over the network and
/// never re-offers a candidate already ruled out.
#[derive(Debug, Clone)]
pub(super) struct ResumeState {
    pub all_candidates: Vec<CandidateVersion>,
    pub cursor: usize,
    pub blacklist: BTreeSet<String>,
}

/// One constraint contributed toward a project's effective constraint, by the selection
/// that declared a dependency on it.
#[derive(Debug, Clone)]
pub(super) struct Contribution {
    pub constraint: Constraint,
}

/// The checked-out state of a committed candidate: everything needed to recompute its
/// reached packages again later without touching the network, since demand on an
/// already-selected project can keep growing as more consumers are discovered.
#[derive(Debug, Clone)]
pub(super) struct Committed {
    pub version: Version,
    pub revision: String,
    pub manifest: Manifest,
    pub tree: PackageTree,
    pub packages: BTreeSet<String>,
}

/// One entry on the selection stack: a project, its accumulated demand, the candidate
/// search state, and enough of a snapshot of global solver state to backtrack to exactly
/// the moment before this frame was created.
pub(super) struct Frame {
    pub root: String,
    pub source_override: Option<String>,
    pub source: SourceRef,
    pub demanded: BTreeSet<String>,
    pub constraint: Constraint,
    pub all_candidates: Vec<CandidateVersion>,
    pub cursor: usize,
    pub blacklist: BTreeSet<String>,
    pub committed: Option<Committed>,
    pub queue_snapshot: VecDeque<PendingAtom>,
    pub queued_roots_snapshot: BTreeSet<String>,
    pub contributions_snapshot: BTreeMap<String, Vec<Contribution>>,
}

/// Groups `imports` under the longest member of `known_roots` that prefixes each one.
/// An import with no matching known root is simply not grouped (and so never becomes
/// demand on a project the consumer never declared) — the unresolved-import case the
/// analyzer would otherwise need a registry to resolve.
#[must_use]
pub(super) fn demand_by_root(imports: &[String], known_roots: &BTreeSet<String>) -> BTreeMap<String, BTreeSet<String>> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for import in imports {
        let best = known_roots
            .iter()
            .filter(|root| import == *root || import.starts_with(&format!("{root}/")))
            .max_by_key(|root| root.len());
        if let Some(root) = best {
            grouped.entry(root.clone()).or_default().insert(import.clone());
        }
    }
    grouped
}

/// Computes which of a project's own packages are actually reached given the packages
/// demanded of it, plus the external imports those reached packages pull in — the
/// "bimodal" step: a project enters the graph only with the packages its consumers
/// actually import, not its whole tree.
///
/// An empty `demanded` set (a project pulled in only via an override no code actually
/// imports) reaches nothing and contributes no further demand, which is the correct
/// behavior rather than an error.
pub(super) fn reached_packages(tree: &PackageTree, demanded: &BTreeSet<String>) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
    if demanded.is_empty() {
        return Ok((BTreeSet::new(), BTreeSet::new()));
    }
    let ignore = IgnoreRules::new(Vec::<String>::new());
    let suppressed = analyzer::reach::compute(tree, &ignore, true);

    let mut internal = BTreeSet::new();
    let mut external = BTreeSet::new();
    let mut any_found = false;
    for package in demanded {
        if let Some(reach) = suppressed.entries.get(package) {
            any_found = true;
            internal.insert(package.clone());
            internal.extend(reach.internal.iter().cloned());
            external.extend(reach.external.iter().cloned());
        }
    }

    if !any_found {
        let unsuppressed = analyzer::reach::compute(tree, &ignore, false);
        if unsuppressed.entries.is_empty() && !suppressed.entries.is_empty() {
            return Err(ResolverError::ImportCycle { cycle: demanded.iter().cloned().collect() });
        }
    }

    Ok((internal, external))
}

/// Returns true if `version` is an admissible match for `constraint`, applying the
/// prerelease opt-in rule: a prerelease candidate is only offered when the constraint
/// itself admits prereleases (a bare range never implicitly widens to include one).
#[must_use]
pub(super) fn candidate_matches(constraint: &Constraint, version: &Version) -> bool {
    let is_prerelease = version.as_semver().is_some_and(|v| !v.pre.is_empty());
    if is_prerelease && !constraint.admits_prereleases() {
        return false;
    }
    constraint.matches(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::package::{Entry, Package};

    #[test]
    fn demand_groups_by_longest_matching_root() {
        let known: BTreeSet<String> = ["example.com/a".to_string(), "example.com/a/sub".to_string()].into_iter().collect();
        let imports = vec!["example.com/a/sub/pkg".to_string(), "example.com/a/other".to_string()];
        let grouped = demand_by_root(&imports, &known);
        assert_eq!(grouped["example.com/a/sub"], ["example.com/a/sub/pkg".to_string()].into_iter().collect());
        assert_eq!(grouped["example.com/a"], ["example.com/a/other".to_string()].into_iter().collect());
    }

    #[test]
    fn unmatched_import_is_dropped() {
        let known: BTreeSet<String> = ["example.com/a".to_string()].into_iter().collect();
        let grouped = demand_by_root(&["fmt".to_string()], &known);
        assert!(grouped.is_empty());
    }

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
    fn empty_demand_reaches_nothing() {
        let tree = tree_with(vec![("example.com/root", vec!["example.com/other"])]);
        let (internal, external) = reached_packages(&tree, &BTreeSet::new()).unwrap();
        assert!(internal.is_empty());
        assert!(external.is_empty());
    }

    #[test]
    fn demanded_package_reaches_its_transitive_imports() {
        let tree = tree_with(vec![("example.com/root", vec!["example.com/other", "fmt"])]);
        let demanded = ["example.com/root".to_string()].into_iter().collect();
        let (internal, external) = reached_packages(&tree, &demanded).unwrap();
        assert!(internal.contains("example.com/root"));
        assert!(external.contains("example.com/other"));
        assert!(external.contains("fmt"));
    }

    #[test]
    fn prerelease_candidate_excluded_unless_constraint_admits_it() {
        let version = Version::parse_tag("1.0.0-rc.1");
        assert!(!candidate_matches(&Constraint::Any, &version));
        let pinned = Constraint::Version(version.clone());
        assert!(candidate_matches(&pinned, &version));
    }
}
