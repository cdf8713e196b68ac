//! The abstract manifest: what a project declares about its dependencies.
//!
//! This crate owns no on-disk manifest *syntax* — an [`crate::core::Analyzer`] derives
//! one of these from whatever format its ecosystem uses. The solver only ever sees the
//! [`Manifest`]/[`RootManifest`] shape below.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::version::Constraint;

/// A single declared dependency: a constraint, plus an optional fetch-location override
/// for the project root it is keyed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// The constraint this dependency must satisfy.
    pub constraint: Constraint,
    /// Alternate fetch location, when the project is vendored under a different URL.
    pub source: Option<String>,
}

impl Dependency {
    /// Builds a dependency with no source override.
    #[must_use]
    pub fn new(constraint: Constraint) -> Self {
        Self { constraint, source: None }
    }

    /// Builds a dependency with an explicit source override.
    #[must_use]
    pub fn with_source(constraint: Constraint, source: impl Into<String>) -> Self {
        Self { constraint, source: Some(source.into()) }
    }
}

/// A mapping from project root to the constraint declared against it.
///
/// Produced per-project by an analyzer; one of these exists per revision of every
/// project the solver visits, not just the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Declared dependencies, keyed by project root.
    pub dependencies: BTreeMap<String, Dependency>,
}

impl Manifest {
    /// Returns the dependency declared for `root`, if any.
    #[must_use]
    pub fn get(&self, root: &str) -> Option<&Dependency> {
        self.dependencies.get(root)
    }

    /// Declares (or replaces) the dependency on `root`.
    pub fn insert(&mut self, root: impl Into<String>, dependency: Dependency) {
        self.dependencies.insert(root.into(), dependency);
    }
}

/// The manifest of the project under resolution, carrying the extra declarations that
/// only make sense at the root: overrides, ignored packages, and required packages.
///
/// Overrides and ordinary constraints never merge by intersection across manifests from
/// different projects; at each resolution step the most-specific applicable override
/// (always a root-manifest override, since only the root carries them) wins outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootManifest {
    /// The root project's own declared dependencies.
    pub manifest: Manifest,
    /// Constraints that unconditionally supersede any transitive project's declaration
    /// for the same root.
    pub overrides: BTreeMap<String, Dependency>,
    /// Packages excluded from the analyzer's reach computation for the root.
    pub ignored: BTreeSet<String>,
    /// Packages that must appear in the root's reach even if no code imports them.
    pub required: BTreeSet<String>,
}

impl RootManifest {
    /// Returns the dependency that governs `root`, preferring an override over the
    /// root's own manifest entry.
    #[must_use]
    pub fn effective(&self, root: &str) -> Option<&Dependency> {
        self.overrides.get(root).or_else(|| self.manifest.get(root))
    }

    /// Returns true if `root` has an override.
    #[must_use]
    pub fn is_overridden(&self, root: &str) -> bool {
        self.overrides.contains_key(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Constraint;

    #[test]
    fn override_wins_over_root_manifest_entry() {
        let mut root = RootManifest::default();
        root.manifest.insert("example.com/q", Dependency::new(Constraint::parse("^1.0.0").unwrap()));
        root.overrides.insert(
            "example.com/q".to_string(),
            Dependency::new(Constraint::parse("2.0.0").unwrap()),
        );

        let effective = root.effective("example.com/q").unwrap();
        assert_eq!(effective.constraint.to_string(), Constraint::parse("2.0.0").unwrap().to_string());
        assert!(root.is_overridden("example.com/q"));
    }

    #[test]
    fn no_override_falls_back_to_manifest() {
        let mut root = RootManifest::default();
        root.manifest.insert("example.com/p", Dependency::new(Constraint::Any));
        assert!(root.effective("example.com/p").is_some());
        assert!(root.effective("example.com/missing").is_none());
    }
}
