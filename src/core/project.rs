//! Project identifiers.
//!
//! A project is identified by its *root* (a hierarchical, URL-like path prefix) and an
//! optional *source override* (an alternate fetch location). Two identifiers are
//! equivalent for resolution purposes if their roots match — the source override only
//! affects where bytes are fetched from, never the project's identity in the dependency
//! graph.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A project identifier: a hierarchical root path plus an optional fetch-location override.
///
/// Ordering is lexicographic on `root`, then on `source`, matching the deterministic
/// project-visitation order the solver relies on ("Projects are visited in
/// deterministic order").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectId {
    /// Hierarchical root path, e.g. `"github.com/owner/repo"`.
    pub root: String,
    /// Alternate fetch location, when the project is vendored under a different URL
    /// than its canonical root implies.
    pub source: Option<String>,
}

impl ProjectId {
    /// Creates a project identifier with no source override.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source: None,
        }
    }

    /// Creates a project identifier with an explicit source override.
    #[must_use]
    pub fn with_source(root: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source: Some(source.into()),
        }
    }

    /// Returns true if `self` and `other` name the same project for resolution purposes.
    ///
    /// Per the data model, only `root` participates in resolution equivalence; the
    /// source override affects fetch location only.
    #[must_use]
    pub fn same_project(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

// `PartialEq`/`Eq`/`Hash` intentionally compare both fields: two `ProjectId`s with
// different source overrides are distinct *values*, even though `same_project` treats
// them as the same resolution target. Callers that need project-identity semantics
// must use `same_project`, not `==`.
impl PartialEq for ProjectId {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.source == other.source
    }
}
impl Eq for ProjectId {}

impl std::hash::Hash for ProjectId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.root.hash(state);
        self.source.hash(state);
    }
}

impl PartialOrd for ProjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.root.cmp(&other.root).then_with(|| self.source.cmp(&other.source))
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({source})", self.root),
            None => write!(f, "{}", self.root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic_on_root_then_source() {
        let a = ProjectId::new("example.com/a");
        let b = ProjectId::new("example.com/b");
        assert!(a < b);

        let a1 = ProjectId::with_source("example.com/a", "alt1");
        let a2 = ProjectId::with_source("example.com/a", "alt2");
        assert!(a1 < a2);
        assert!(a < a1);
    }

    #[test]
    fn same_project_ignores_source_override() {
        let a = ProjectId::new("example.com/a");
        let a_alt = ProjectId::with_source("example.com/a", "mirror.example.com/a");
        assert!(a.same_project(&a_alt));
        assert_ne!(a, a_alt);
    }
}
