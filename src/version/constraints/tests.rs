use super::*;
use crate::version::Version;

fn v(s: &str) -> Version {
    Version::parse_tag(s)
}

#[test]
fn bare_version_is_a_point_constraint() {
    let c = Constraint::parse("1.2.3").unwrap();
    assert!(c.matches(&v("1.2.3")));
    assert!(!c.matches(&v("1.2.4")));
}

#[test]
fn comparison_operators() {
    let c = Constraint::parse(">=1.2.3").unwrap();
    assert!(c.matches(&v("1.2.3")));
    assert!(c.matches(&v("2.0.0")));
    assert!(!c.matches(&v("1.2.2")));

    let c = Constraint::parse("<2.0.0").unwrap();
    assert!(c.matches(&v("1.9.9")));
    assert!(!c.matches(&v("2.0.0")));
}

#[test]
fn caret_below_and_above_1_0_0() {
    let c = Constraint::parse("^1.2.3").unwrap();
    assert!(c.matches(&v("1.9.0")));
    assert!(!c.matches(&v("2.0.0")));

    let c = Constraint::parse("^0.2.3").unwrap();
    assert!(c.matches(&v("0.2.9")));
    assert!(!c.matches(&v("0.3.0")));

    let c = Constraint::parse("^0.0.3").unwrap();
    assert!(c.matches(&v("0.0.3")));
    assert!(!c.matches(&v("0.0.4")));
}

#[test]
fn tilde_locks_to_minor() {
    let c = Constraint::parse("~1.2.3").unwrap();
    assert!(c.matches(&v("1.2.3")));
    assert!(c.matches(&v("1.2.9")));
    assert!(!c.matches(&v("1.3.0")));
    assert!(!c.matches(&v("1.2.2")));
}

#[test]
fn intersecting_two_overlapping_ranges_narrows_to_their_common_span() {
    let a = Constraint::parse(">=1.1.7, <1.3.0").unwrap();
    let b = Constraint::parse(">=1.2.0, <1.4.0").unwrap();
    let narrowed = a.intersect(&b);
    assert_eq!(narrowed.to_string(), Constraint::parse(">=1.2.0, <1.3.0").unwrap().to_string());
    assert!(narrowed.matches(&v("1.2.5")));
    assert!(!narrowed.matches(&v("1.1.9")));
    assert!(!narrowed.matches(&v("1.3.0")));
}

#[test]
fn wildcard_expands_to_range() {
    let c = Constraint::parse("1.x").unwrap();
    assert!(c.matches(&v("1.9.9")));
    assert!(!c.matches(&v("2.0.0")));

    let c = Constraint::parse("1.2.x").unwrap();
    assert!(c.matches(&v("1.2.9")));
    assert!(!c.matches(&v("1.3.0")));
}

#[test]
fn comma_is_intersection() {
    let c = Constraint::parse(">=1.0.0, <2.0.0").unwrap();
    assert!(c.matches(&v("1.5.0")));
    assert!(!c.matches(&v("2.0.0")));
    assert!(!c.matches(&v("0.9.0")));
}

#[test]
fn double_pipe_is_union() {
    let c = Constraint::parse("1.2.3 || 2.x").unwrap();
    assert!(c.matches(&v("1.2.3")));
    assert!(c.matches(&v("2.5.0")));
    assert!(!c.matches(&v("1.2.4")));
}

#[test]
fn hyphen_range() {
    let c = Constraint::parse("1.2.3 - 1.5.0").unwrap();
    assert!(c.matches(&v("1.2.3")));
    assert!(c.matches(&v("1.5.0")));
    assert!(!c.matches(&v("1.5.1")));
}

#[test]
fn any_and_none_absorb() {
    let any = Constraint::Any;
    let none = Constraint::None;
    let c = Constraint::parse("^1.0.0").unwrap();

    assert!(matches!(c.intersect(&any), Constraint::Range(_)));
    assert!(matches!(c.intersect(&none), Constraint::None));
    assert!(matches!(c.union(&any), Constraint::Any));
    assert_eq!(none.union(&c).to_string(), c.to_string());
}

#[test]
fn adjacent_ranges_coalesce_on_union() {
    let a = Constraint::parse(">=1.0.0, <2.0.0").unwrap();
    let b = Constraint::parse(">=2.0.0, <3.0.0").unwrap();
    let merged = a.union(&b);
    assert!(matches!(merged, Constraint::Range(_)), "expected a single coalesced range, got {merged}");
    assert!(merged.matches(&v("1.5.0")));
    assert!(merged.matches(&v("2.5.0")));
    assert!(!merged.matches(&v("3.0.0")));
}

#[test]
fn disjoint_ranges_stay_a_union() {
    let a = Constraint::parse("1.0.0").unwrap();
    let b = Constraint::parse("3.0.0").unwrap();
    let merged = a.union(&b);
    assert!(matches!(merged, Constraint::Union(_)));
    assert!(merged.matches(&v("1.0.0")));
    assert!(!merged.matches(&v("2.0.0")));
    assert!(merged.matches(&v("3.0.0")));
}

#[test]
fn equal_bounds_both_inclusive_collapse_to_point() {
    let lo = Bound { version: v("1.0.0"), inclusive: true };
    let hi = Bound { version: v("1.0.0"), inclusive: true };
    let c = Range::new(Some(lo), Some(hi));
    assert!(matches!(c, Constraint::Version(_)));
}

#[test]
fn equal_bounds_with_exclusive_side_collapse_to_none() {
    let lo = Bound { version: v("1.0.0"), inclusive: true };
    let hi = Bound { version: v("1.0.0"), inclusive: false };
    let c = Range::new(Some(lo), Some(hi));
    assert!(matches!(c, Constraint::None));
}

#[test]
fn inverted_bounds_collapse_to_none() {
    let lo = Bound { version: v("2.0.0"), inclusive: true };
    let hi = Bound { version: v("1.0.0"), inclusive: true };
    let c = Range::new(Some(lo), Some(hi));
    assert!(matches!(c, Constraint::None));
}

#[test]
fn round_trips_through_parse_and_display() {
    for input in ["^1.2.3", "~1.2.3", ">=1.0.0, <2.0.0", "1.x", "*"] {
        let parsed = Constraint::parse(input).unwrap();
        let rendered = parsed.to_string();
        let reparsed = Constraint::parse(&rendered).unwrap();
        assert_eq!(parsed.to_string(), reparsed.to_string(), "round trip failed for {input}");
    }
}

#[test]
fn admits_prereleases_only_when_explicit() {
    let release = Constraint::parse(">=1.0.0").unwrap();
    assert!(!release.admits_prereleases());

    let pre = Constraint::parse(">=1.0.0-rc.1").unwrap();
    assert!(pre.admits_prereleases());
}

#[test]
fn serde_round_trip_through_json() {
    let constraints = vec![
        Constraint::Any,
        Constraint::None,
        Constraint::parse("1.2.3").unwrap(),
        Constraint::parse("^1.2.3").unwrap(),
        Constraint::parse("1.0.0 || 3.0.0").unwrap(),
    ];
    for c in constraints {
        let json = serde_json::to_string(&c).unwrap();
        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(c.to_string(), back.to_string());
    }
}
