//! Core types shared across the resolver.
//!
//! This module holds the pieces with no natural home elsewhere: the error taxonomy, the
//! project identifier, and the analyzer plug-in trait that decouples the solver from any
//! one package ecosystem.

pub mod default_analyzer;
pub mod error;
pub mod plugin;
pub mod project;

pub use default_analyzer::GoImportAnalyzer;
pub use error::{Cancelled, Outcome, ResolverError, Result};
pub use plugin::{Analyzer, AnalyzerInfo};
pub use project::ProjectId;
