//! Error taxonomy for the resolver core.
//!
//! This module provides the strongly-typed error enum used across the crate. Errors are
//! organized around the taxonomy described in the design: parse errors, resolution errors,
//! source errors, cancellation, and invariant violations. Cancellation is deliberately kept
//! out of [`ResolverError`] — it is a distinct outcome, not a failure, and is represented by
//! [`Cancelled`].
//!
//! # Design
//!
//! - **Strongly-typed errors** ([`ResolverError`]) for precise handling in library code.
//! - **Structured context**: each variant carries the fields a caller needs (project root,
//!   attempted version, underlying tool output) rather than a pre-formatted string.
//! - **Cancellation is not failure**: code that observes a cancellation must propagate
//!   [`Cancelled`], never wrap it in [`ResolverError`].

use std::fmt;
use thiserror::Error;

/// The result type used throughout the resolver core.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// All failure modes produced by the resolver core.
///
/// Variants are grouped by the taxonomy in the design notes: parse errors, resolution
/// errors, source errors, and invariant violations. Cancellation is represented separately
/// by [`Cancelled`] so call sites cannot accidentally match it as a resolution failure.
#[derive(Debug, Error)]
pub enum ResolverError {
    // -- Parse errors -----------------------------------------------------
    /// A version string could not be parsed.
    #[error("invalid version `{input}`: {reason}")]
    InvalidVersion {
        /// The offending input string.
        input: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A constraint string could not be parsed.
    #[error("invalid constraint `{input}`: {reason}")]
    InvalidConstraint {
        /// The offending input string.
        input: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A source file could not be parsed by the analyzer.
    #[error("cannot parse `{path}`: {reason}")]
    MalformedSource {
        /// Path to the offending file, relative to the package directory.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    // -- Resolution errors --------------------------------------------------
    /// No version of a project satisfies its effective constraint.
    #[error("no version of `{project_root}` satisfies `{constraint}`")]
    NoMatchingVersion {
        /// The project root that could not be satisfied.
        project_root: String,
        /// The effective constraint at the point of failure.
        constraint: String,
    },

    /// A required project was never declared and could not be located.
    #[error("missing project `{project_root}`")]
    MissingProject {
        /// The unresolvable project root.
        project_root: String,
    },

    /// The demanded packages of a project form an import cycle that the solver
    /// cannot break (as distinct from an analyzer-level cycle, which is not an error).
    #[error("import cycle among demanded packages: {}", .cycle.join(" -> "))]
    ImportCycle {
        /// The packages forming the cycle, in traversal order.
        cycle: Vec<String>,
    },

    /// The solver exhausted every candidate without finding a solution.
    #[error("dependency resolution failed: {explanation}")]
    ResolutionFailed {
        /// A human-readable explanation assembled from the failure ledger.
        explanation: String,
    },

    // -- Source errors --------------------------------------------------
    /// The remote source could not be reached.
    #[error("source `{source}` unreachable: {reason}")]
    SourceUnreachable {
        /// The source identifier (typically a fetch URL).
        source: String,
        /// Human-readable reason, including any underlying tool output.
        reason: String,
    },

    /// Authentication with the remote source failed.
    #[error("authentication failed for `{source}`")]
    AuthenticationFailed {
        /// The source identifier.
        source: String,
    },

    /// The local cache for a source is corrupt and could not be repaired.
    #[error("cache corrupt for `{source}`: {reason}")]
    CacheCorrupt {
        /// The source identifier.
        source: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A requested revision does not exist upstream. Distinct sentinel so callers can
    /// distinguish "not found" from a generic source error.
    #[error("revision `{revision}` not found in `{source}`")]
    RevisionNotFound {
        /// The source identifier.
        source: String,
        /// The requested revision.
        revision: String,
    },

    /// The VCS executable required for an operation is not installed.
    #[error("required executable `{program}` not found on PATH")]
    ExecutableNotFound {
        /// The program name (`git`, `hg`, `bzr`, `svn`).
        program: String,
    },

    /// The on-disk cache-root lock file is already held by another process.
    #[error("cache directory `{path}` is locked by another process")]
    CacheLocked {
        /// The path to the lock file.
        path: String,
    },

    // -- Invariant violations --------------------------------------------------
    /// An analyzer plug-in returned internally inconsistent data.
    #[error("analyzer `{analyzer}` returned inconsistent data: {reason}")]
    InvariantViolation {
        /// The analyzer's `info()` name.
        analyzer: String,
        /// Human-readable description of the inconsistency.
        reason: String,
    },

    /// Wraps an I/O failure with the path that triggered it.
    #[error("I/O error at `{path}`: {source}")]
    Io {
        /// The path being operated on.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Catch-all for contextual failures bubbled up from `anyhow`-using internals.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResolverError {
    /// Returns true if retrying the same operation against a fresh cache might succeed.
    ///
    /// Used by the source manager to decide whether to blacklist a single revision
    /// (recoverable) or propagate the failure for the whole source (not recoverable).
    #[must_use]
    pub fn is_cache_recoverable(&self) -> bool {
        matches!(self, Self::CacheCorrupt { .. } | Self::RevisionNotFound { .. })
    }
}

/// Distinct outcome representing a cancelled operation.
///
/// Never convertible to or from [`ResolverError`] — call sites that observe cancellation
/// must propagate it as its own outcome, per the design's "cancellation is never surfaced
/// as a resolution error" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// An outcome that is either a successful value, a resolver error, or a cancellation.
///
/// Source-manager and solver suspension points return this instead of burying
/// cancellation inside the error type.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation completed successfully.
    Ready(T),
    /// The operation failed.
    Failed(ResolverError),
    /// The operation was cancelled before completion.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Converts into a `Result`, treating cancellation as an error via `on_cancel`.
    pub fn into_result_with(self, on_cancel: impl FnOnce() -> ResolverError) -> Result<T> {
        match self {
            Self::Ready(v) => Ok(v),
            Self::Failed(e) => Err(e),
            Self::Cancelled => Err(on_cancel()),
        }
    }
}
