//! End-to-end resolution against local `file://` git fixtures: tests use
//! local `file://` git repositories created on the fly rather than a mock registry or a
//! live network.
//!
//! Each fixture's project root is wired to its `file://` URL via
//! [`Config::register_fixed_source`], the deduction-chain analog of a `go.mod replace`
//! directive, so the solver never needs a reachable host to resolve these trees.

use std::collections::BTreeSet;
use std::path::Path;

use depsolve::config::Config;
use depsolve::core::GoImportAnalyzer;
use depsolve::core::project::ProjectId;
use depsolve::lockfile::{Lock, LockedProject};
use depsolve::manifest::{Dependency, RootManifest};
use depsolve::solver::{self, SolverInput};
use depsolve::source::SourceManager;
use depsolve::test_utils::RepoFixture;
use depsolve::version::{Constraint, Version};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Writes a single-file Go-style package directly under a plain (non-git) directory, for
/// the root tree, which the solver reads straight off disk rather than through a source.
fn write_root_package(root_dir: &Path, imports: &[&str]) {
    let import_block = if imports.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = imports.iter().map(|i| format!("\t\"{i}\"")).collect();
        format!("\nimport (\n{}\n)\n", lines.join("\n"))
    };
    std::fs::write(root_dir.join("main.go"), format!("package main\n{import_block}")).unwrap();
}

async fn source_manager_with(cache_dir: &Path, fixed_sources: &[(&str, &str)]) -> SourceManager {
    let mut config = Config::default_for_process();
    config.cache_dir = cache_dir.to_path_buf();
    for (root, url) in fixed_sources {
        config.register_fixed_source(*root, *url);
    }
    SourceManager::new(config).await.expect("source manager construction")
}

/// Diamond dependency: root requires B `^1.1.0` and C `^1.0.0`; B itself requires C
/// `^1.1.0`. Only one version of C can be chosen, and it must satisfy both contributors.
#[tokio::test]
async fn diamond_dependency_intersects_contributed_constraints() {
    let c = RepoFixture::new().unwrap();
    c.write_go_package(".", "c", &[]).unwrap();
    c.commit_and_tag("c 1.0.0", "1.0.0").unwrap();
    c.write_file("VERSION", "1.1.0\n").unwrap();
    c.commit_and_tag("c 1.1.0", "1.1.0").unwrap();

    let b = RepoFixture::new().unwrap();
    b.write_go_package(".", "b", &["test.local/proj-c"]).unwrap();
    b.write_file("depsolve.deps.json", r#"{"test.local/proj-c": "^1.1.0"}"#).unwrap();
    b.commit_and_tag("b 1.1.0", "1.1.0").unwrap();

    let root_dir = TempDir::new().unwrap();
    write_root_package(root_dir.path(), &["test.local/proj-b", "test.local/proj-c"]);

    let mut root_manifest = RootManifest::default();
    root_manifest.manifest.insert("test.local/proj-b", Dependency::new(Constraint::parse("^1.1.0").unwrap()));
    root_manifest.manifest.insert("test.local/proj-c", Dependency::new(Constraint::parse("^1.0.0").unwrap()));

    let cache_dir = TempDir::new().unwrap();
    let source_manager = source_manager_with(cache_dir.path(), &[("test.local/proj-b", &b.file_url()), ("test.local/proj-c", &c.file_url())]).await;
    let analyzer = GoImportAnalyzer;
    let force_update = BTreeSet::new();
    let cancel = CancellationToken::new();

    let input = SolverInput {
        root_dir: root_dir.path(),
        root_import_path: "test.local/root",
        root_manifest: &root_manifest,
        existing_lock: None,
        downgrade: false,
        force_update: &force_update,
    };

    let lock = solver::resolve(&source_manager, &analyzer, input, &cancel).await.unwrap().unwrap();

    let b_locked = lock.project("test.local/proj-b").expect("b resolved");
    assert_eq!(b_locked.version.as_semver().unwrap().to_string(), "1.1.0");
    let c_locked = lock.project("test.local/proj-c").expect("c resolved");
    assert_eq!(c_locked.version.as_semver().unwrap().to_string(), "1.1.0");
}

/// An unconstrained root dependency with several available versions: upgrade mode picks
/// the newest, downgrade mode picks the oldest.
#[tokio::test]
async fn unconstrained_dependency_honors_upgrade_and_downgrade_ordering() {
    let p = RepoFixture::new().unwrap();
    p.write_go_package(".", "p", &[]).unwrap();
    p.commit_and_tag("p 1.0.0", "1.0.0").unwrap();
    p.write_file("VERSION", "1.0.1\n").unwrap();
    p.commit_and_tag("p 1.0.1", "1.0.1").unwrap();
    p.write_file("VERSION", "2.0.0\n").unwrap();
    p.commit_and_tag("p 2.0.0", "2.0.0").unwrap();

    let root_dir = TempDir::new().unwrap();
    write_root_package(root_dir.path(), &["test.local/proj-p"]);

    let mut root_manifest = RootManifest::default();
    root_manifest.manifest.insert("test.local/proj-p", Dependency::new(Constraint::Any));

    let cache_dir = TempDir::new().unwrap();
    let source_manager = source_manager_with(cache_dir.path(), &[("test.local/proj-p", &p.file_url())]).await;
    let analyzer = GoImportAnalyzer;
    let force_update = BTreeSet::new();

    for (downgrade, expected) in [(false, "2.0.0"), (true, "1.0.0")] {
        let cancel = CancellationToken::new();
        let input = SolverInput {
            root_dir: root_dir.path(),
            root_import_path: "test.local/root",
            root_manifest: &root_manifest,
            existing_lock: None,
            downgrade,
            force_update: &force_update,
        };
        let lock = solver::resolve(&source_manager, &analyzer, input, &cancel).await.unwrap().unwrap();
        let locked = lock.project("test.local/proj-p").expect("p resolved");
        assert_eq!(locked.version.as_semver().unwrap().to_string(), expected, "downgrade={downgrade}");
    }
}

/// An existing lock pins a version that isn't the newest available; with no
/// `force_update`, the lock's choice is preferred over the default newest-first ordering.
#[tokio::test]
async fn existing_lock_preference_is_honored_over_newest_first_ordering() {
    let p = RepoFixture::new().unwrap();
    p.write_go_package(".", "p", &[]).unwrap();
    p.commit_and_tag("p 1.0.0", "1.0.0").unwrap();
    p.write_file("VERSION", "1.0.1\n").unwrap();
    p.commit_and_tag("p 1.0.1", "1.0.1").unwrap();
    let locked_revision = p.rev_parse("1.0.1").unwrap();
    p.write_file("VERSION", "2.0.0\n").unwrap();
    p.commit_and_tag("p 2.0.0", "2.0.0").unwrap();

    let root_dir = TempDir::new().unwrap();
    write_root_package(root_dir.path(), &["test.local/proj-p"]);

    let mut root_manifest = RootManifest::default();
    root_manifest.manifest.insert("test.local/proj-p", Dependency::new(Constraint::Any));

    let cache_dir = TempDir::new().unwrap();
    let source_manager = source_manager_with(cache_dir.path(), &[("test.local/proj-p", &p.file_url())]).await;
    let analyzer = GoImportAnalyzer;
    let force_update = BTreeSet::new();
    let cancel = CancellationToken::new();

    let locked_version = Version::paired(Version::parse_tag("1.0.1"), locked_revision).unwrap();
    let existing_lock = Lock {
        projects: vec![LockedProject::new(ProjectId::new("test.local/proj-p"), locked_version, BTreeSet::new())],
        input_imports: vec!["test.local/proj-p".to_string()],
    };

    let input = SolverInput {
        root_dir: root_dir.path(),
        root_import_path: "test.local/root",
        root_manifest: &root_manifest,
        existing_lock: Some(&existing_lock),
        downgrade: false,
        force_update: &force_update,
    };

    let lock = solver::resolve(&source_manager, &analyzer, input, &cancel).await.unwrap().unwrap();
    let locked = lock.project("test.local/proj-p").expect("p resolved");
    assert_eq!(locked.version.as_semver().unwrap().to_string(), "1.0.1");
}

/// A root override pins a transitive dependency to a branch, overriding the constraint
/// its only other consumer declares.
#[tokio::test]
async fn root_override_to_a_branch_wins_over_a_transitive_constraint() {
    let q = RepoFixture::new().unwrap();
    q.ensure_branch("main").unwrap();
    q.write_go_package(".", "q", &[]).unwrap();
    q.commit("q initial").unwrap();
    q.checkout_new_branch("fix").unwrap();
    q.write_file("VERSION", "fix\n").unwrap();
    q.commit("q fix branch").unwrap();

    let r = RepoFixture::new().unwrap();
    r.write_go_package(".", "r", &["test.local/proj-q"]).unwrap();
    r.write_file("depsolve.deps.json", r#"{"test.local/proj-q": "^1.0.0"}"#).unwrap();
    r.commit_and_tag("r 1.0.0", "1.0.0").unwrap();

    let root_dir = TempDir::new().unwrap();
    write_root_package(root_dir.path(), &["test.local/proj-r"]);

    let mut root_manifest = RootManifest::default();
    root_manifest.manifest.insert("test.local/proj-r", Dependency::new(Constraint::Any));
    root_manifest.overrides.insert(
        "test.local/proj-q".to_string(),
        Dependency::new(Constraint::Version(Version::Branch { name: "fix".to_string(), is_default: false })),
    );

    let cache_dir = TempDir::new().unwrap();
    let source_manager =
        source_manager_with(cache_dir.path(), &[("test.local/proj-r", &r.file_url()), ("test.local/proj-q", &q.file_url())]).await;
    let analyzer = GoImportAnalyzer;
    let force_update = BTreeSet::new();
    let cancel = CancellationToken::new();

    let input = SolverInput {
        root_dir: root_dir.path(),
        root_import_path: "test.local/root",
        root_manifest: &root_manifest,
        existing_lock: None,
        downgrade: false,
        force_update: &force_update,
    };

    let lock = solver::resolve(&source_manager, &analyzer, input, &cancel).await.unwrap().unwrap();

    let r_locked = lock.project("test.local/proj-r").expect("r resolved");
    assert_eq!(r_locked.version.as_semver().unwrap().to_string(), "1.0.0");

    let q_locked = lock.project("test.local/proj-q").expect("q resolved");
    match q_locked.version.symbolic() {
        Version::Branch { name, .. } => assert_eq!(name, "fix"),
        other => panic!("expected q locked to branch fix, got {other:?}"),
    }
}
