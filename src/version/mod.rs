//! The version algebra.
//!
//! A [`Version`] names one point of history for a project: a semver tag, a plain
//! (non-semver) tag, a branch, a raw revision, or a symbolic version paired with the
//! revision it currently resolves to. [`constraints::Constraint`] describes a set of
//! versions. Together these two types are the vocabulary the solver reasons in; nothing
//! above this module ever compares version *strings* directly.
//!
//! Parsing is cached (see [`parse_cache`]) since the solver re-parses the same manifest
//! constraint strings for every candidate it considers.

pub mod constraints;
pub mod parse_cache;

pub use constraints::Constraint;

use std::cmp::Ordering;
use std::fmt;

use semver::Version as SemverVersion;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, ResolverError};

/// One point of history for a project.
///
/// Ordering and equality are defined within a variant; see [`Version::partial_cmp`] for
/// the cross-variant rules (most pairs are simply incomparable).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Version {
    /// A tag that parses as a semantic version, e.g. `v1.2.3` or `2.0.0-rc.1`.
    Semver(SemverVersion),
    /// A tag that does not parse as semver, compared as an opaque string.
    Plain(String),
    /// A named, mutable ref.
    Branch {
        /// The branch name.
        name: String,
        /// Whether this is the source's default branch (e.g. `main`/`master`/`trunk`).
        is_default: bool,
    },
    /// An immutable content identifier (a VCS commit hash).
    Revision(String),
    /// A symbolic version bound to the revision it resolved to at observation time.
    Paired {
        /// The symbolic side; never itself a `Revision` or another `Paired`.
        symbolic: Box<Version>,
        /// The revision the symbolic side pointed to when this pairing was made.
        revision: String,
    },
}

impl Version {
    /// Builds a paired version, rejecting attempts to pair a revision with itself or to
    /// nest a pairing inside another.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidVersion`] if `symbolic` is a [`Version::Revision`]
    /// or [`Version::Paired`].
    pub fn paired(symbolic: Version, revision: impl Into<String>) -> Result<Version> {
        match symbolic {
            Version::Revision(_) | Version::Paired { .. } => Err(ResolverError::InvalidVersion {
                input: symbolic.to_string(),
                reason: "only a semver, plain, or branch version may be paired with a revision".into(),
            }),
            symbolic => Ok(Version::Paired {
                symbolic: Box::new(symbolic),
                revision: revision.into(),
            }),
        }
    }

    /// Returns the revision this version resolves to, if it carries one directly
    /// (i.e. is itself a [`Version::Revision`] or a [`Version::Paired`]).
    #[must_use]
    pub fn revision(&self) -> Option<&str> {
        match self {
            Version::Revision(rev) => Some(rev.as_str()),
            Version::Paired { revision, .. } => Some(revision.as_str()),
            _ => None,
        }
    }

    /// Returns the symbolic (non-revision) side of this version: itself, unless this is
    /// a [`Version::Paired`], in which case its inner symbolic version.
    #[must_use]
    pub fn symbolic(&self) -> &Version {
        match self {
            Version::Paired { symbolic, .. } => symbolic,
            other => other,
        }
    }

    /// Returns the parsed semver, when this version (or its symbolic side) is a
    /// [`Version::Semver`].
    #[must_use]
    pub fn as_semver(&self) -> Option<&SemverVersion> {
        match self.symbolic() {
            Version::Semver(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if this is a revision, or a paired version whose revision side
    /// equals `candidate`.
    #[must_use]
    pub fn matches_revision(&self, candidate: &str) -> bool {
        self.revision().is_some_and(|rev| rev == candidate)
    }

    /// Parses a tag string as a [`Version::Semver`] if possible, otherwise as a
    /// [`Version::Plain`]. A leading `v` is stripped before the semver attempt, per the
    /// tolerant `[v]MAJOR[.MINOR[.PATCH]]` grammar; missing minor/patch components
    /// default to zero.
    #[must_use]
    pub fn parse_tag(tag: &str) -> Version {
        if let Some(cached) = parse_cache::get_version(tag) {
            return cached;
        }
        let version = Self::parse_tag_uncached(tag);
        parse_cache::put_version(tag, version.clone());
        version
    }

    fn parse_tag_uncached(tag: &str) -> Version {
        let trimmed = tag.strip_prefix('v').unwrap_or(tag);
        match normalize_and_parse_semver(trimmed) {
            Some(v) => Version::Semver(v),
            None => Version::Plain(tag.to_string()),
        }
    }
}

/// Parses `MAJOR[.MINOR[.PATCH]][-PRE][+META]`, filling missing components with zero.
fn normalize_and_parse_semver(input: &str) -> Option<SemverVersion> {
    let (core, rest) = match input.find(['-', '+']) {
        Some(idx) => (&input[..idx], &input[idx..]),
        None => (input, ""),
    };
    let mut parts = core.split('.');
    let major = parts.next()?;
    if !major.chars().all(|c| c.is_ascii_digit()) || major.is_empty() {
        return None;
    }
    let minor = parts.next().unwrap_or("0");
    let patch = parts.next().unwrap_or("0");
    if parts.next().is_some() {
        return None;
    }
    if !minor.chars().all(|c| c.is_ascii_digit()) || !patch.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let normalized = format!("{major}.{minor}.{patch}{rest}");
    SemverVersion::parse(&normalized).ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semver(v) => write!(f, "{v}"),
            Version::Plain(s) => write!(f, "{s}"),
            Version::Branch { name, .. } => write!(f, "{name}"),
            Version::Revision(rev) => write!(f, "{rev}"),
            Version::Paired { symbolic, revision } => write!(f, "{symbolic} ({revision})"),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Version::Semver(a), Version::Semver(b)) => a == b,
            (Version::Plain(a), Version::Plain(b)) => a == b,
            (Version::Branch { name: a, .. }, Version::Branch { name: b, .. }) => a == b,
            (Version::Revision(a), Version::Revision(b)) => a == b,
            (
                Version::Paired { symbolic: sa, revision: ra },
                Version::Paired { symbolic: sb, revision: rb },
            ) => sa == sb && ra == rb,
            _ => false,
        }
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    /// Defines a total order only within a variant, matching the data model's rule that
    /// "revisions compare only by bytewise equality", and only a partial relation across
    /// variants (everything else returns `None`).
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Version::Semver(a), Version::Semver(b)) => Some(a.cmp(b)),
            (Version::Plain(a), Version::Plain(b)) => Some(a.cmp(b)),
            (
                Version::Branch { name: a, is_default: da },
                Version::Branch { name: b, is_default: db },
            ) => match (da, db) {
                (true, false) => Some(Ordering::Less),
                (false, true) => Some(Ordering::Greater),
                _ => Some(a.cmp(b)),
            },
            (Version::Revision(a), Version::Revision(b)) => {
                if a == b {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            (Version::Paired { symbolic: sa, .. }, Version::Paired { symbolic: sb, .. }) => {
                sa.partial_cmp(sb)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tag_fills_missing_components() {
        assert_eq!(Version::parse_tag("v1"), Version::Semver(SemverVersion::new(1, 0, 0)));
        assert_eq!(Version::parse_tag("1.2"), Version::Semver(SemverVersion::new(1, 2, 0)));
        assert_eq!(
            Version::parse_tag("1.2.3"),
            Version::Semver(SemverVersion::new(1, 2, 3))
        );
    }

    #[test]
    fn non_semver_tags_are_plain() {
        assert_eq!(Version::parse_tag("release-candidate"), Version::Plain("release-candidate".into()));
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let pre = Version::parse_tag("1.0.0-rc.1");
        let release = Version::parse_tag("1.0.0");
        assert!(pre < release);
    }

    #[test]
    fn default_branch_sorts_before_non_default() {
        let main = Version::Branch { name: "main".into(), is_default: true };
        let feature = Version::Branch { name: "aaa-feature".into(), is_default: false };
        assert!(main < feature);
    }

    #[test]
    fn revisions_are_incomparable_unless_equal() {
        let a = Version::Revision("abc123".into());
        let b = Version::Revision("def456".into());
        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(a.partial_cmp(&a.clone()), Some(Ordering::Equal));
    }

    #[test]
    fn paired_version_exposes_both_sides() {
        let paired = Version::paired(Version::parse_tag("v1.2.3"), "abc123").unwrap();
        assert_eq!(paired.revision(), Some("abc123"));
        assert_eq!(paired.as_semver(), Some(&SemverVersion::new(1, 2, 3)));
        assert!(paired.matches_revision("abc123"));
        assert!(!paired.matches_revision("other"));
    }

    #[test]
    fn pairing_a_revision_is_rejected() {
        let err = Version::paired(Version::Revision("abc123".into()), "abc123");
        assert!(err.is_err());
    }

    #[test]
    fn serde_round_trip_through_json() {
        let versions = vec![
            Version::Semver(SemverVersion::new(1, 2, 3)),
            Version::Plain("weird-tag".into()),
            Version::Branch { name: "main".into(), is_default: true },
            Version::Revision("deadbeef".into()),
            Version::paired(Version::parse_tag("v2.0.0"), "cafef00d").unwrap(),
        ];
        for version in versions {
            let json = serde_json::to_string(&version).unwrap();
            let back: Version = serde_json::from_str(&json).unwrap();
            assert_eq!(version, back);
        }
    }
}
