//! The analyzer plug-in seam.
//!
//! The solver core is deliberately ignorant of any single package ecosystem. It asks an
//! [`Analyzer`] to turn a checked-out project tree into the abstract manifest/lock pair
//! described in the data model, and never inspects source files itself. This mirrors the
//! "one analyzer per ecosystem" boundary in the design: a Go-import-path analyzer is the
//! only implementation shipped here, but the trait is the seam a second ecosystem would
//! plug into.

use std::path::Path;

use crate::core::error::Result;
use crate::core::project::ProjectId;
use crate::lockfile::Lock;
use crate::manifest::Manifest;

/// Static identity of an analyzer, surfaced in diagnostics and invariant-violation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerInfo {
    /// Short, stable name (e.g. `"go-import-path"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
}

/// Derives the abstract manifest and lock for a single checked-out project tree.
///
/// Implementations never touch the network or the source manager's cache directly; they
/// are handed an already-synced directory and asked to classify it. All filesystem
/// walking, ignore-rule application, and import-cycle detection happens behind this
/// trait, inside the analyzer's own implementation (see the package analyzer module).
pub trait Analyzer: Send + Sync {
    /// Returns static identity information for this analyzer.
    fn info(&self) -> AnalyzerInfo;

    /// Walks `root` (the checked-out tree for `project`) and derives its manifest and
    /// lock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::ResolverError::MalformedSource`] if a source file
    /// cannot be parsed, or
    /// [`crate::core::error::ResolverError::ImportCycle`] if the demanded packages cannot
    /// be flattened into an acyclic set.
    fn derive_manifest_and_lock(&self, project: &ProjectId, root: &Path) -> Result<(Manifest, Lock)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAnalyzer;

    impl Analyzer for NullAnalyzer {
        fn info(&self) -> AnalyzerInfo {
            AnalyzerInfo {
                name: "null",
                description: "always returns an empty manifest and lock",
            }
        }

        fn derive_manifest_and_lock(&self, _project: &ProjectId, _root: &Path) -> Result<(Manifest, Lock)> {
            Ok((Manifest::default(), Lock::default()))
        }
    }

    #[test]
    fn trait_object_is_usable_behind_a_dyn_reference() {
        let analyzer: Box<dyn Analyzer> = Box::new(NullAnalyzer);
        assert_eq!(analyzer.info().name, "null");
    }
}
