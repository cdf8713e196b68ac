//! Process-wide cache of previously-parsed version and constraint strings.
//!
//! Built the same way `dashmap` is used elsewhere in this crate for caching: a
//! concurrent map guarded by a single enable flag, so a
//! long-running embedder (the source manager re-parses the same manifest constraint
//! strings across many candidate versions) can bound memory with [`disable`] or [`clear`]
//! without threading a cache handle through every call site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;

use super::constraints::Constraint;
use super::Version;

static ENABLED: AtomicBool = AtomicBool::new(true);

fn version_cache() -> &'static DashMap<String, Version> {
    static CACHE: OnceLock<DashMap<String, Version>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

fn constraint_cache() -> &'static DashMap<String, Constraint> {
    static CACHE: OnceLock<DashMap<String, Constraint>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Disables the cache. Already-cached entries are retained until [`clear`] is called;
/// future lookups and inserts become no-ops.
pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst);
}

/// Re-enables the cache after [`disable`].
pub fn enable() {
    ENABLED.store(true, Ordering::SeqCst);
}

/// Drops every cached entry. Safe to call regardless of the enable flag.
pub fn clear() {
    version_cache().clear();
    constraint_cache().clear();
}

/// Returns a cached parse of `input`, if present and the cache is enabled.
#[must_use]
pub fn get_version(input: &str) -> Option<Version> {
    if !ENABLED.load(Ordering::SeqCst) {
        return None;
    }
    version_cache().get(input).map(|entry| entry.value().clone())
}

/// Records a parse result for `input`, unless the cache is disabled.
pub fn put_version(input: &str, version: Version) {
    if ENABLED.load(Ordering::SeqCst) {
        version_cache().insert(input.to_string(), version);
    }
}

/// Returns a cached parse of `input`, if present and the cache is enabled.
#[must_use]
pub fn get_constraint(input: &str) -> Option<Constraint> {
    if !ENABLED.load(Ordering::SeqCst) {
        return None;
    }
    constraint_cache().get(input).map(|entry| entry.value().clone())
}

/// Records a parse result for `input`, unless the cache is disabled.
pub fn put_constraint(input: &str, constraint: Constraint) {
    if ENABLED.load(Ordering::SeqCst) {
        constraint_cache().insert(input.to_string(), constraint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn disable_stops_new_inserts_but_clear_still_empties() {
        enable();
        clear();
        put_version("v1.0.0", Version::parse_tag("v1.0.0"));
        assert!(get_version("v1.0.0").is_some());

        disable();
        put_version("v2.0.0", Version::parse_tag("v2.0.0"));
        assert!(get_version("v2.0.0").is_none());

        enable();
        clear();
        assert!(get_version("v1.0.0").is_none());
    }
}
