//! The abstract lock: an immutable record of a completed resolution.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::project::ProjectId;
use crate::version::Version;

/// A content digest over a locked project's exported tree, for callers that want to
/// verify a cache hasn't drifted from what was locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigest {
    /// Version of the hashing scheme used to produce `digest`, so a future algorithm
    /// change doesn't silently compare incompatible digests.
    pub algorithm_version: u32,
    /// The digest itself, hex-encoded.
    pub digest: String,
}

/// One project's outcome in a completed resolution.
///
/// Immutable once constructed — the solver builds a fresh [`LockedProject`] for each
/// candidate it commits to rather than mutating one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedProject {
    /// The project this entry locks.
    pub project: ProjectId,
    /// The version assigned to the project, paired with its resolved revision.
    pub version: Version,
    /// The subset of the project's packages actually reached from the root.
    pub packages: BTreeSet<String>,
    /// Optional prune-behavior bitset, opaque to this crate, interpreted by whatever
    /// downstream installer consumes the lock.
    pub prune_options: Option<u32>,
    /// Optional content digest for drift detection.
    pub digest: Option<ContentDigest>,
}

impl LockedProject {
    /// Builds a locked project with no verifiability extensions.
    #[must_use]
    pub fn new(project: ProjectId, version: Version, packages: BTreeSet<String>) -> Self {
        Self { project, version, packages, prune_options: None, digest: None }
    }
}

/// The outcome of a completed resolution: an ordered list of locked projects, plus the
/// root's external reach at lock time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lock {
    /// Locked projects, in solver-visitation order.
    pub projects: Vec<LockedProject>,
    /// The computed external import paths reachable from the root when this lock was
    /// produced. Used to detect when re-resolution is needed even if every existing
    /// entry is still individually satisfiable (the root started importing something
    /// new).
    pub input_imports: Vec<String>,
}

impl Lock {
    /// Returns the locked entry for `root`, if present.
    #[must_use]
    pub fn project(&self, root: &str) -> Option<&LockedProject> {
        self.projects.iter().find(|p| p.project.root == root)
    }

    /// Compares two locks dimension by dimension: which projects were added, removed, or
    /// changed version, and whether the root's external reach changed.
    #[must_use]
    pub fn diff(&self, other: &Lock) -> LockDiff {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut changed = Vec::new();

        for entry in &other.projects {
            match self.project(&entry.project.root) {
                None => added.push(entry.project.root.clone()),
                Some(previous) if previous.version != entry.version => {
                    changed.push(entry.project.root.clone());
                }
                Some(_) => {}
            }
        }
        for entry in &self.projects {
            if other.project(&entry.project.root).is_none() {
                removed.push(entry.project.root.clone());
            }
        }

        LockDiff { added, removed, changed, input_imports_changed: self.input_imports != other.input_imports }
    }
}

/// The result of comparing two locks, one field per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockDiff {
    /// Project roots present in the new lock but not the old.
    pub added: Vec<String>,
    /// Project roots present in the old lock but not the new.
    pub removed: Vec<String>,
    /// Project roots present in both locks but assigned a different version.
    pub changed: Vec<String>,
    /// Whether the root's external reach differs between the two locks.
    pub input_imports_changed: bool,
}

impl LockDiff {
    /// Returns true if the two locks are identical in every dimension.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty() && !self.input_imports_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn locked(root: &str, version: &str) -> LockedProject {
        LockedProject::new(ProjectId::new(root), Version::parse_tag(version), BTreeSet::new())
    }

    #[test]
    fn diff_detects_added_removed_and_changed() {
        let old = Lock { projects: vec![locked("a", "1.0.0"), locked("b", "1.0.0")], input_imports: vec!["a".into()] };
        let new = Lock { projects: vec![locked("a", "2.0.0"), locked("c", "1.0.0")], input_imports: vec!["a".into()] };

        let diff = old.diff(&new);
        assert_eq!(diff.added, vec!["c".to_string()]);
        assert_eq!(diff.removed, vec!["b".to_string()]);
        assert_eq!(diff.changed, vec!["a".to_string()]);
        assert!(!diff.input_imports_changed);
    }

    #[test]
    fn identical_locks_produce_empty_diff() {
        let lock = Lock { projects: vec![locked("a", "1.0.0")], input_imports: vec!["a".into()] };
        assert!(lock.diff(&lock.clone()).is_empty());
    }
}
