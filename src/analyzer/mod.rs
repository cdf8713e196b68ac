//! The package-tree analyzer: walks a project's filesystem tree, classifies directories
//! into packages, computes cross-package reach, and flattens the result into the external
//! import list the solver treats as a project's demand.

pub mod flatten;
pub mod ignore;
pub mod package;
pub mod reach;

pub use flatten::{flatten_external, flatten_external_from_buildable_sources, is_probably_stdlib};
pub use ignore::IgnoreRules;
pub use package::{Entry, Package, PackageTree, Problem, walk};
pub use reach::{Reach, ReachMap, compute};
