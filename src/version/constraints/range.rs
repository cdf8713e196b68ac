//! Bounded intervals over [`Version`], the building block [`Constraint::Range`] wraps.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Constraint;
use crate::version::Version;

/// One endpoint of a [`Range`]: a version plus whether the endpoint itself is included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    /// The endpoint version.
    pub version: Version,
    /// Whether the endpoint version is itself a member of the range.
    pub inclusive: bool,
}

/// An interval `[min?, max?]` with optional excluded points.
///
/// `min`/`max` of `None` mean unbounded on that side. Construct via [`Range::new`] or
/// [`Range::with_excluded`] rather than the struct literal — those functions perform the
/// canonicalization the data model requires (degenerate ranges collapse to a point or to
/// [`Constraint::None`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound, if any.
    pub min: Option<Bound>,
    /// Upper bound, if any.
    pub max: Option<Bound>,
    /// Points excluded from an otherwise-matching range.
    pub excluded: Vec<Version>,
}

impl Range {
    /// Builds a range with no excluded points, canonicalizing degenerate cases.
    #[must_use]
    pub fn new(min: Option<Bound>, max: Option<Bound>) -> Constraint {
        Self::with_excluded(min, max, Vec::new())
    }

    /// Builds a range, canonicalizing degenerate cases per the data model: `min > max`
    /// collapses to [`Constraint::None`]; equal bounds both inclusive collapse to a
    /// point [`Constraint::Version`]; equal bounds with either side exclusive collapse
    /// to [`Constraint::None`].
    #[must_use]
    pub fn with_excluded(min: Option<Bound>, max: Option<Bound>, mut excluded: Vec<Version>) -> Constraint {
        if let (Some(lo), Some(hi)) = (&min, &max) {
            match lo.version.partial_cmp(&hi.version) {
                Some(Ordering::Greater) => return Constraint::None,
                Some(Ordering::Equal) => {
                    return if lo.inclusive && hi.inclusive {
                        Constraint::Version(lo.version.clone())
                    } else {
                        Constraint::None
                    };
                }
                _ => {}
            }
        }
        excluded.sort_by_key(ToString::to_string);
        excluded.dedup();
        Constraint::Range(Range { min, max, excluded })
    }

    /// Returns the canonicalized constraint for this range's current fields (used after
    /// in-place merges that may have produced a degenerate interval).
    #[must_use]
    pub fn into_constraint(self) -> Constraint {
        Self::with_excluded(self.min, self.max, self.excluded)
    }

    /// Returns true if `v` (compared via its symbolic side, see [`Version::symbolic`])
    /// lies within the interval and is not one of the excluded points.
    #[must_use]
    pub fn matches(&self, v: &Version) -> bool {
        let probe = v.symbolic();
        if self.excluded.iter().any(|e| e == probe) {
            return false;
        }
        let above_min = match &self.min {
            None => true,
            Some(bound) => match probe.partial_cmp(&bound.version) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => bound.inclusive,
                _ => false,
            },
        };
        let below_max = match &self.max {
            None => true,
            Some(bound) => match probe.partial_cmp(&bound.version) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => bound.inclusive,
                _ => false,
            },
        };
        above_min && below_max
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (Some(lo), Some(hi)) => write!(
                f,
                "{}{} , {}{}",
                if lo.inclusive { ">=" } else { ">" },
                lo.version,
                if hi.inclusive { "<=" } else { "<" },
                hi.version
            ),
            (Some(lo), None) => write!(f, "{}{}", if lo.inclusive { ">=" } else { ">" }, lo.version),
            (None, Some(hi)) => write!(f, "{}{}", if hi.inclusive { "<=" } else { "<" }, hi.version),
            (None, None) => write!(f, "*"),
        }
    }
}

/// Returns the tighter (larger) of two lower bounds, as needed for intersection.
pub(super) fn tighter_min(a: &Option<Bound>, b: &Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, x) | (x, None) => x.clone(),
        (Some(ba), Some(bb)) => match ba.version.partial_cmp(&bb.version) {
            Some(Ordering::Greater) => Some(ba.clone()),
            Some(Ordering::Less) => Some(bb.clone()),
            Some(Ordering::Equal) => Some(Bound {
                version: ba.version.clone(),
                inclusive: ba.inclusive && bb.inclusive,
            }),
            None => Some(ba.clone()),
        },
    }
}

/// Returns the tighter (smaller) of two upper bounds, as needed for intersection.
pub(super) fn tighter_max(a: &Option<Bound>, b: &Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, x) | (x, None) => x.clone(),
        (Some(ba), Some(bb)) => match ba.version.partial_cmp(&bb.version) {
            Some(Ordering::Less) => Some(ba.clone()),
            Some(Ordering::Greater) => Some(bb.clone()),
            Some(Ordering::Equal) => Some(Bound {
                version: ba.version.clone(),
                inclusive: ba.inclusive && bb.inclusive,
            }),
            None => Some(ba.clone()),
        },
    }
}

/// Returns the looser (smaller) of two lower bounds, as needed for union merging.
/// Unbounded (`None`) on either side makes the merged bound unbounded.
pub(super) fn looser_min(a: &Option<Bound>, b: &Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, _) | (_, None) => None,
        (Some(ba), Some(bb)) => match ba.version.partial_cmp(&bb.version) {
            Some(Ordering::Less) => Some(ba.clone()),
            Some(Ordering::Greater) => Some(bb.clone()),
            Some(Ordering::Equal) => Some(Bound {
                version: ba.version.clone(),
                inclusive: ba.inclusive || bb.inclusive,
            }),
            None => Some(ba.clone()),
        },
    }
}

/// Returns the looser (larger) of two upper bounds, as needed for union merging.
pub(super) fn looser_max(a: &Option<Bound>, b: &Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, _) | (_, None) => None,
        (Some(ba), Some(bb)) => match ba.version.partial_cmp(&bb.version) {
            Some(Ordering::Greater) => Some(ba.clone()),
            Some(Ordering::Less) => Some(bb.clone()),
            Some(Ordering::Equal) => Some(Bound {
                version: ba.version.clone(),
                inclusive: ba.inclusive || bb.inclusive,
            }),
            None => Some(ba.clone()),
        },
    }
}

/// Returns true if `a` and `b` overlap or touch at a shared inclusive endpoint, meaning
/// their union is a single contiguous range rather than two disjoint members.
pub(super) fn overlaps_or_adjoins(a: &Range, b: &Range) -> bool {
    !ends_before(a, b) && !ends_before(b, a)
}

/// Returns true if `a` lies entirely below `b` with a genuine gap between them.
fn ends_before(a: &Range, b: &Range) -> bool {
    match (&a.max, &b.min) {
        (Some(am), Some(bm)) => match am.version.partial_cmp(&bm.version) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => !(am.inclusive || bm.inclusive),
            _ => false,
        },
        _ => false,
    }
}

/// Merges two overlapping or adjoining ranges into one. Callers must check
/// [`overlaps_or_adjoins`] first.
pub(super) fn merge(a: &Range, b: &Range) -> Range {
    let excluded: Vec<Version> = a
        .excluded
        .iter()
        .filter(|v| b.excluded.contains(v))
        .cloned()
        .collect();
    Range {
        min: looser_min(&a.min, &b.min),
        max: looser_max(&a.max, &b.max),
        excluded,
    }
}
