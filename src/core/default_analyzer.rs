//! The one [`Analyzer`] this crate ships, grounded on the same import-path conventions
//! the source manager's deduction chain ([`crate::source::deduce`]) already uses
//! rather than on any single ecosystem's manifest syntax. It derives a project's
//! dependency set entirely from its computed external reach, optionally overlaid
//! with version constraints from a small JSON sidecar file — never a full manifest
//! format parser for any ecosystem's on-disk syntax.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::analyzer::{self, flatten_external_from_buildable_sources, is_probably_stdlib, IgnoreRules};
use crate::core::error::{ResolverError, Result};
use crate::core::plugin::{Analyzer, AnalyzerInfo};
use crate::core::project::ProjectId;
use crate::lockfile::Lock;
use crate::manifest::{Dependency, Manifest};
use crate::version::Constraint;

/// Name of the optional JSON sidecar a checked-out tree may carry to pin constraints on
/// its dependencies. Absent entirely, every dependency this analyzer derives defaults to
/// [`Constraint::Any`] — the analyzer still discovers *which* projects are depended on
/// from the import graph alone.
const CONSTRAINT_OVERLAY_FILE: &str = "depsolve.deps.json";

/// Derives a [`Manifest`] purely from a checked-out tree's import graph: every external
/// import reachable from a buildable source package is collapsed to a project root via
/// the same vanity-import convention ([`derive_project_root`]) used throughout this
/// crate's tests, and constrained either by [`CONSTRAINT_OVERLAY_FILE`] or left
/// unconstrained.
///
/// This is the one analyzer shipped with the crate (see [`Analyzer`]'s docs); a caller
/// embedding a real ecosystem's manifest format supplies its own implementation instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoImportAnalyzer;

impl Analyzer for GoImportAnalyzer {
    fn info(&self) -> AnalyzerInfo {
        AnalyzerInfo {
            name: "go-import-path",
            description: "derives a manifest from a project's import graph, overlaid with an optional depsolve.deps.json constraint file",
        }
    }

    fn derive_manifest_and_lock(&self, project: &ProjectId, root: &Path) -> Result<(Manifest, Lock)> {
        let tree = analyzer::walk(root, &project.root);
        let ignore = IgnoreRules::new(Vec::new());
        let reach_map = analyzer::reach::compute(&tree, &ignore, false);
        let external = flatten_external_from_buildable_sources(&reach_map, is_probably_stdlib);

        let overlay = read_constraint_overlay(root)?;

        let mut roots: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for import in &external {
            roots.insert(derive_project_root(import));
        }
        roots.remove(&project.root);

        let mut manifest = Manifest::default();
        for dependency_root in roots {
            let dependency = match overlay.get(&dependency_root) {
                Some(raw) => Dependency::new(Constraint::parse(raw).map_err(|e| ResolverError::InvalidConstraint {
                    input: raw.clone(),
                    reason: e.to_string(),
                })?),
                None => Dependency::new(Constraint::Any),
            };
            manifest.insert(dependency_root, dependency);
        }

        Ok((manifest, Lock::default()))
    }
}

/// Collapses an import path to the project root a vanity-import host would deduce:
/// the first three path segments (`host/org/repo`) if the first segment looks like a
/// domain (contains a dot), otherwise the whole first segment, matching the convention
/// [`crate::source::deduce::deduce_from_patterns`] uses for registered prefixes.
#[must_use]
pub fn derive_project_root(import_path: &str) -> String {
    let segments: Vec<&str> = import_path.split('/').collect();
    match segments.first() {
        Some(first) if first.contains('.') => segments.iter().take(segments.len().min(3)).copied().collect::<Vec<_>>().join("/"),
        Some(first) => (*first).to_string(),
        None => import_path.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConstraintOverlay(BTreeMap<String, String>);

impl ConstraintOverlay {
    fn get(&self, root: &str) -> Option<&String> {
        self.0.get(root)
    }
}

fn read_constraint_overlay(root: &Path) -> Result<ConstraintOverlay> {
    let path = root.join(CONSTRAINT_OVERLAY_FILE);
    let Ok(contents) = fs::read_to_string(&path) else {
        return Ok(ConstraintOverlay::default());
    };
    serde_json::from_str(&contents).map_err(|e| {
        ResolverError::MalformedSource {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_host_org_repo_root_from_a_dotted_first_segment() {
        assert_eq!(derive_project_root("example.com/owner/repo/sub/pkg"), "example.com/owner/repo");
        assert_eq!(derive_project_root("example.com/owner/repo"), "example.com/owner/repo");
    }

    #[test]
    fn non_dotted_first_segment_is_its_own_root() {
        assert_eq!(derive_project_root("internal/util"), "internal");
    }

    #[test]
    fn missing_overlay_file_yields_any_constraints() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/main.go"), "package main\n\nimport \"example.com/owner/repo\"\n").unwrap();

        let analyzer = GoImportAnalyzer;
        let project = ProjectId::new("example.com/self/project");
        let (manifest, _lock) = analyzer.derive_manifest_and_lock(&project, dir.path()).unwrap();

        let dependency = manifest.get("example.com/owner/repo").expect("dependency discovered from import graph");
        assert_eq!(dependency.constraint.to_string(), Constraint::Any.to_string());
    }

    #[test]
    fn overlay_file_pins_a_constraint() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/main.go"), "package main\n\nimport \"example.com/owner/repo\"\n").unwrap();
        fs::write(dir.path().join(CONSTRAINT_OVERLAY_FILE), r#"{"example.com/owner/repo": "^1.2.0"}"#).unwrap();

        let analyzer = GoImportAnalyzer;
        let project = ProjectId::new("example.com/self/project");
        let (manifest, _lock) = analyzer.derive_manifest_and_lock(&project, dir.path()).unwrap();

        let dependency = manifest.get("example.com/owner/repo").unwrap();
        assert_eq!(dependency.constraint.to_string(), Constraint::parse("^1.2.0").unwrap().to_string());
    }
}
