//! depsolve - a dependency resolver for source-based package ecosystems
//!
//! A library implementing the version/constraint algebra, backtracking constraint
//! solver, package-tree analyzer, and VCS-agnostic source manager needed to resolve a
//! tree of source-hosted dependencies (in the style of pre-modules Go dependency
//! tooling) into a reproducible lock, without owning any on-disk manifest syntax itself.
//!
//! # Architecture
//!
//! - [`version`] - version and constraint algebra (SemVer, plain tags, branches,
//!   revisions, and paired symbolic+revision versions)
//! - [`manifest`] - the abstract manifest/root-manifest shape callers' analyzers produce
//! - [`lockfile`] - the abstract lock a completed resolution produces
//! - [`analyzer`] - package-tree walking, reach computation, and external-import
//!   flattening
//! - [`vcs`] - per-VCS gateways (git, Mercurial, Bazaar, Subversion) behind a uniform
//!   subprocess-execution interface
//! - [`source`] - the source manager: cached, cancellable, per-source-serialized access
//!   to remote sources regardless of VCS
//! - [`cache`] - the on-disk source cache and its locking
//! - [`solver`] - the backtracking constraint solver driving everything above
//! - [`core`] - shared types: the error taxonomy, project identifiers, the analyzer
//!   plug-in trait
//! - [`config`] - process-wide configuration
//! - [`constants`] - shared numeric/timing constants
//! - [`utils`] - small cross-cutting helpers
//!
//! # Non-goals
//!
//! This crate owns no on-disk manifest or lock *syntax* (an [`core::Analyzer`]
//! implementation supplies that), no vendor-tree export heuristics beyond
//! [`source::SourceManager::export_project`], and no mock registry service. A minimal
//! demonstration binary lives at `src/main.rs` to exercise the library end-to-end; it is
//! not a production CLI front-end.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod constants;
pub mod core;
pub mod lockfile;
pub mod manifest;
pub mod solver;
pub mod source;
pub mod utils;
pub mod vcs;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
