//! The constraint algebra: sets of [`Version`]s, with intersection, union, and a
//! superset-of-semver parser/stringifier.

mod range;
#[cfg(test)]
mod tests;

pub use range::{Bound, Range};

use std::fmt;

use semver::Version as SemverVersion;
use serde::{Deserialize, Serialize};

use super::{parse_cache, Version};
use crate::core::error::{ResolverError, Result};

/// A set of versions.
///
/// Built up from [`Constraint::Any`]/[`Constraint::None`]/a single [`Version`]/a
/// [`Range`], combined through [`Constraint::intersect`] and [`Constraint::union`], which
/// keep the representation canonical (see [`Range::with_excluded`] and
/// [`Constraint::normalize_members`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Constraint {
    /// Matches every version.
    Any,
    /// Matches no version; the empty set.
    None,
    /// A single version, treated as a point set.
    Version(Version),
    /// A bounded interval, optionally with excluded points.
    Range(Range),
    /// The union of the member constraints. Never contains another `Union`, `Any`, or
    /// `None`, and never has fewer than two members (normalization collapses those
    /// cases).
    Union(Vec<Constraint>),
}

impl Constraint {
    /// Parses a constraint string.
    ///
    /// Supports a bare version (exact match), comparison operators (`=`, `>`, `>=`, `<`,
    /// `<=`), caret (`^`) and tilde (`~`) ranges, `X`/`x`/`*` wildcards, comma-separated
    /// intersection, `||`-separated union, and `A - B` hyphen ranges (equivalent to
    /// `>=A, <=B`). Results are cached; see [`parse_cache`](super::parse_cache).
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidConstraint`] if no grammar rule matches.
    pub fn parse(input: &str) -> Result<Constraint> {
        if let Some(cached) = parse_cache::get_constraint(input) {
            return Ok(cached);
        }
        let constraint = parse_uncached(input)?;
        parse_cache::put_constraint(input, constraint.clone());
        Ok(constraint)
    }

    /// Returns true iff `v` lies in this constraint's set.
    #[must_use]
    pub fn matches(&self, v: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::None => false,
            Constraint::Version(point) => version_matches_point(v, point),
            Constraint::Range(r) => r.matches(v),
            Constraint::Union(items) => items.iter().any(|c| c.matches(v)),
        }
    }

    /// Returns true iff `self` and `other` share at least one version.
    #[must_use]
    pub fn matches_any(&self, other: &Constraint) -> bool {
        !matches!(self.intersect(other), Constraint::None)
    }

    /// Returns the canonical constraint representing the set intersection.
    #[must_use]
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        if matches!(self, Constraint::None) || matches!(other, Constraint::None) {
            return Constraint::None;
        }
        if matches!(self, Constraint::Any) {
            return other.clone();
        }
        if matches!(other, Constraint::Any) {
            return self.clone();
        }
        if let Constraint::Union(items) = self {
            let parts: Vec<Constraint> = items.iter().map(|i| i.intersect(other)).collect();
            return normalize_members(parts);
        }
        if let Constraint::Union(items) = other {
            let parts: Vec<Constraint> = items.iter().map(|i| self.intersect(i)).collect();
            return normalize_members(parts);
        }
        let ra = as_range(self).expect("Version/Range constraint is representable as a range");
        let rb = as_range(other).expect("Version/Range constraint is representable as a range");
        let min = range::tighter_min(&ra.min, &rb.min);
        let max = range::tighter_max(&ra.max, &rb.max);
        let mut excluded = ra.excluded;
        excluded.extend(rb.excluded);
        Range::with_excluded(min, max, excluded)
    }

    /// Returns the canonical constraint representing the set union; adjacent or
    /// overlapping ranges coalesce into a single range.
    #[must_use]
    pub fn union(&self, other: &Constraint) -> Constraint {
        if matches!(self, Constraint::Any) || matches!(other, Constraint::Any) {
            return Constraint::Any;
        }
        if matches!(self, Constraint::None) {
            return other.clone();
        }
        if matches!(other, Constraint::None) {
            return self.clone();
        }
        let mut members = Vec::new();
        flatten_into(self, &mut members);
        flatten_into(other, &mut members);
        normalize_members(members)
    }

    /// Returns true if this constraint names a version with a non-empty prerelease
    /// component, directly or as a range endpoint. The solver only offers a prerelease
    /// candidate when the project's effective constraint admits one this way — bare
    /// ranges never implicitly widen to include prereleases.
    #[must_use]
    pub fn admits_prereleases(&self) -> bool {
        fn has_pre(v: &Version) -> bool {
            v.as_semver().is_some_and(|s| !s.pre.is_empty())
        }
        match self {
            Constraint::Any | Constraint::None => false,
            Constraint::Version(v) => has_pre(v),
            Constraint::Range(r) => {
                r.min.as_ref().is_some_and(|b| has_pre(&b.version))
                    || r.max.as_ref().is_some_and(|b| has_pre(&b.version))
            }
            Constraint::Union(items) => items.iter().any(Constraint::admits_prereleases),
        }
    }
}

fn version_matches_point(candidate: &Version, point: &Version) -> bool {
    if let Some(rev) = point.revision() {
        if candidate.matches_revision(rev) {
            return true;
        }
    }
    candidate.symbolic() == point.symbolic()
}

fn as_range(c: &Constraint) -> Option<Range> {
    match c {
        Constraint::Version(v) => Some(Range {
            min: Some(Bound { version: v.clone(), inclusive: true }),
            max: Some(Bound { version: v.clone(), inclusive: true }),
            excluded: Vec::new(),
        }),
        Constraint::Range(r) => Some(r.clone()),
        _ => None,
    }
}

fn flatten_into(c: &Constraint, out: &mut Vec<Constraint>) {
    match c {
        Constraint::Any | Constraint::None => {}
        Constraint::Union(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

/// Merges a flat list of `Version`/`Range` constraints, coalescing overlapping or
/// adjoining ranges, then collapses to `None`/a single member/a sorted `Union`.
fn normalize_members(members: Vec<Constraint>) -> Constraint {
    let mut ranges: Vec<Range> = members.iter().filter_map(as_range).collect();
    ranges.sort_by(compare_range_start);

    let mut merged: Vec<Range> = Vec::new();
    for r in ranges {
        if let Some(last) = merged.last_mut() {
            if range::overlaps_or_adjoins(last, &r) {
                *last = range::merge(last, &r);
                continue;
            }
        }
        merged.push(r);
    }

    let mut constraints: Vec<Constraint> = merged.into_iter().map(Range::into_constraint).collect();
    constraints.retain(|c| !matches!(c, Constraint::None));
    constraints.sort_by_key(ToString::to_string);
    constraints.dedup_by_key(ToString::to_string);

    match constraints.len() {
        0 => Constraint::None,
        1 => constraints.into_iter().next().expect("len checked above"),
        _ => Constraint::Union(constraints),
    }
}

fn compare_range_start(a: &Range, b: &Range) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (&a.min, &b.min) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(ba), Some(bb)) => ba
            .version
            .partial_cmp(&bb.version)
            .unwrap_or(Ordering::Equal)
            .then_with(|| bb.inclusive.cmp(&ba.inclusive)),
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => write!(f, "*"),
            Constraint::None => write!(f, "<none>"),
            Constraint::Version(v) => write!(f, "={v}"),
            Constraint::Range(r) => write!(f, "{r}"),
            Constraint::Union(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

// -- Parsing -----------------------------------------------------------------

fn parse_uncached(input: &str) -> Result<Constraint> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok(Constraint::Any);
    }
    let mut members = trimmed.split("||").map(parse_intersection);
    let mut result = members.next().expect("split always yields at least one item")?;
    for next in members {
        result = result.union(&next?);
    }
    Ok(result)
}

fn parse_intersection(part: &str) -> Result<Constraint> {
    let part = part.trim();
    if let Some(idx) = part.find(" - ") {
        let lower = parse_plain_version(&part[..idx])?;
        let upper = parse_plain_version(&part[idx + 3..])?;
        return Ok(Range::new(
            Some(Bound { version: lower, inclusive: true }),
            Some(Bound { version: upper, inclusive: true }),
        ));
    }
    let mut result = Constraint::Any;
    for atom in part.split(',') {
        result = result.intersect(&parse_atom(atom)?);
    }
    Ok(result)
}

fn parse_atom(s: &str) -> Result<Constraint> {
    let s = s.trim();
    if s.is_empty() || s == "*" {
        return Ok(Constraint::Any);
    }
    if let Some(rest) = s.strip_prefix(">=") {
        return bound_from(rest, true, true);
    }
    if let Some(rest) = s.strip_prefix("<=") {
        return bound_from(rest, false, true);
    }
    if let Some(rest) = s.strip_prefix('>') {
        return bound_from(rest, true, false);
    }
    if let Some(rest) = s.strip_prefix('<') {
        return bound_from(rest, false, false);
    }
    if let Some(rest) = s.strip_prefix('=') {
        return Ok(Constraint::Version(parse_plain_version(rest)?));
    }
    if let Some(rest) = s.strip_prefix('^') {
        return caret_range(rest);
    }
    if let Some(rest) = s.strip_prefix('~') {
        return tilde_range(rest);
    }
    if has_wildcard(s) {
        return wildcard_range(s);
    }
    Ok(Constraint::Version(parse_plain_version(s)?))
}

fn bound_from(rest: &str, is_lower: bool, inclusive: bool) -> Result<Constraint> {
    let version = parse_plain_version(rest)?;
    let bound = Bound { version, inclusive };
    Ok(if is_lower {
        Range::new(Some(bound), None)
    } else {
        Range::new(None, Some(bound))
    })
}

fn has_wildcard(s: &str) -> bool {
    s.split('.').any(|p| p.eq_ignore_ascii_case("x") || p == "*")
}

fn wildcard_range(s: &str) -> Result<Constraint> {
    let is_wild = |p: &str| p.eq_ignore_ascii_case("x") || p == "*";
    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || is_wild(parts[0]) {
        return Ok(Constraint::Any);
    }
    let major: u64 = parts[0]
        .parse()
        .map_err(|_| invalid(s, "expected a numeric major version"))?;
    let minor_is_wild = parts.len() < 2 || is_wild(parts[1]);
    if minor_is_wild {
        return Ok(Range::new(
            Some(Bound { version: Version::Semver(SemverVersion::new(major, 0, 0)), inclusive: true }),
            Some(Bound { version: Version::Semver(SemverVersion::new(major + 1, 0, 0)), inclusive: false }),
        ));
    }
    let minor: u64 = parts[1].parse().map_err(|_| invalid(s, "expected a numeric minor version"))?;
    Ok(Range::new(
        Some(Bound { version: Version::Semver(SemverVersion::new(major, minor, 0)), inclusive: true }),
        Some(Bound {
            version: Version::Semver(SemverVersion::new(major, minor + 1, 0)),
            inclusive: false,
        }),
    ))
}

fn caret_range(rest: &str) -> Result<Constraint> {
    let raw = RawVersion::parse(rest)?;
    let lower = raw.to_semver()?;
    let upper = if raw.major > 0 {
        SemverVersion::new(raw.major + 1, 0, 0)
    } else if raw.minor > 0 {
        SemverVersion::new(0, raw.minor + 1, 0)
    } else if raw.explicit >= 3 {
        SemverVersion::new(0, 0, raw.patch + 1)
    } else {
        SemverVersion::new(0, 1, 0)
    };
    Ok(Range::new(
        Some(Bound { version: Version::Semver(lower), inclusive: true }),
        Some(Bound { version: Version::Semver(upper), inclusive: false }),
    ))
}

fn tilde_range(rest: &str) -> Result<Constraint> {
    let raw = RawVersion::parse(rest)?;
    let lower = raw.to_semver()?;
    let upper = if raw.explicit >= 2 {
        SemverVersion::new(raw.major, raw.minor + 1, 0)
    } else {
        SemverVersion::new(raw.major + 1, 0, 0)
    };
    Ok(Range::new(
        Some(Bound { version: Version::Semver(lower), inclusive: true }),
        Some(Bound { version: Version::Semver(upper), inclusive: false }),
    ))
}

fn parse_plain_version(s: &str) -> Result<Version> {
    Ok(Version::Semver(RawVersion::parse(s)?.to_semver()?))
}

fn invalid(input: &str, reason: &str) -> ResolverError {
    ResolverError::InvalidConstraint { input: input.to_string(), reason: reason.to_string() }
}

/// The `MAJOR[.MINOR[.PATCH]][-PRE][+META]` components of a version string, plus how
/// many numeric components were given explicitly — needed to implement caret/tilde
/// semantics, which behave differently for e.g. `^0.0.3` vs `^0.0.x`.
struct RawVersion {
    major: u64,
    minor: u64,
    patch: u64,
    suffix: String,
    explicit: usize,
}

impl RawVersion {
    fn parse(input: &str) -> Result<RawVersion> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (core, suffix) = match trimmed.find(['-', '+']) {
            Some(idx) => (&trimmed[..idx], trimmed[idx..].to_string()),
            None => (trimmed, String::new()),
        };
        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
            return Err(invalid(input, "expected MAJOR[.MINOR[.PATCH]]"));
        }
        let major = parts[0].parse().map_err(|_| invalid(input, "major version out of range"))?;
        let minor = parts.get(1).map(|p| p.parse()).transpose().map_err(|_| invalid(input, "minor version out of range"))?.unwrap_or(0);
        let patch = parts.get(2).map(|p| p.parse()).transpose().map_err(|_| invalid(input, "patch version out of range"))?.unwrap_or(0);
        Ok(RawVersion { major, minor, patch, suffix, explicit: parts.len() })
    }

    fn to_semver(&self) -> Result<SemverVersion> {
        let rendered = format!("{}.{}.{}{}", self.major, self.minor, self.patch, self.suffix);
        SemverVersion::parse(&rendered).map_err(|e| invalid(&rendered, &e.to_string()))
    }
}
