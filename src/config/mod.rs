//! Process-wide configuration, threaded explicitly rather than read from ambient global
//! state, collapsed to the handful of knobs this crate's `SourceManager` actually needs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the cache root directory.
pub const CACHE_DIR_ENV_VAR: &str = "DEPSOLVE_CACHE_DIR";

/// A registered import-path deduction pattern: a prefix and the regex splitter used to
/// derive a project root and source URL from any import path under that prefix.
///
/// Patterns are consulted in registration order; the first whose `prefix` matches wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionPattern {
    /// The import-path prefix this pattern applies to, e.g. `"github.com/"`.
    pub prefix: String,
    /// A regex with named capture groups `root` and `source` (and optionally `vcs`)
    /// applied to the remainder of the import path after `prefix`.
    pub pattern: String,
    /// URL scheme used to build the source URL when the `source` capture is a bare
    /// path rather than one that already names its own scheme (`https` if absent) —
    /// e.g. `"ssh"` for a host only ever reachable over SSH, or `"file"` for fixtures
    /// addressing a local working tree directly.
    #[serde(default)]
    pub scheme: Option<String>,
    /// A fixed source URL this pattern always resolves to, bypassing the `source`/
    /// `scheme` derivation entirely — the deduction-chain analog of a `go.mod replace`
    /// directive or a Cargo `[patch]` entry: one known project root pinned to an exact
    /// location rather than derived by a general host rule.
    #[serde(default)]
    pub source_override: Option<String>,
}

/// Process-wide knobs for a resolution run, constructed once and passed explicitly into
/// [`crate::source::SourceManager::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory the source cache lives under. Defaults to `dirs::cache_dir()` with
    /// a `depsolve` subdirectory, overridable via [`CACHE_DIR_ENV_VAR`].
    pub cache_dir: PathBuf,
    /// How long a single [`crate::cache::lock::CacheLock::acquire`] call is allowed to
    /// block before the caller should give up (enforced by the caller via
    /// `tokio::time::timeout`; the lock primitive itself never times out on its own).
    #[serde(with = "duration_secs")]
    pub lock_timeout: Duration,
    /// Whether the process-wide version/constraint parse cache is enabled.
    pub parse_cache_enabled: bool,
    /// Registered source-deduction patterns, consulted in order.
    pub deduction_patterns: Vec<DeductionPattern>,
}

impl Config {
    /// Builds a config with the default cache directory (`dirs::cache_dir()/depsolve`,
    /// or the value of [`CACHE_DIR_ENV_VAR`] if set), a two-minute lock timeout, the
    /// parse cache enabled, and no registered deduction patterns.
    #[must_use]
    pub fn default_for_process() -> Self {
        let cache_dir = std::env::var_os(CACHE_DIR_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|d| d.join("depsolve")))
            .unwrap_or_else(|| PathBuf::from(".depsolve-cache"));

        Self { cache_dir, lock_timeout: crate::constants::default_lock_timeout(), parse_cache_enabled: true, deduction_patterns: Vec::new() }
    }

    /// Registers a deduction pattern, appended after any already registered.
    pub fn register_deduction_pattern(&mut self, prefix: impl Into<String>, pattern: impl Into<String>) {
        self.deduction_patterns.push(DeductionPattern { prefix: prefix.into(), pattern: pattern.into(), scheme: None, source_override: None });
    }

    /// Registers a deduction pattern with an explicit URL scheme, for hosts whose
    /// source URL isn't `https`.
    pub fn register_deduction_pattern_with_scheme(&mut self, prefix: impl Into<String>, pattern: impl Into<String>, scheme: impl Into<String>) {
        self.deduction_patterns.push(DeductionPattern {
            prefix: prefix.into(),
            pattern: pattern.into(),
            scheme: Some(scheme.into()),
            source_override: None,
        });
    }

    /// Pins `project_root` to `source_url` outright, like a `go.mod replace` directive
    /// or a Cargo `[patch]` entry — the exact root matches with no further derivation.
    pub fn register_fixed_source(&mut self, project_root: impl Into<String>, source_url: impl Into<String>) {
        self.deduction_patterns.push(DeductionPattern {
            prefix: project_root.into(),
            pattern: r"^(?P<root>)$".to_string(),
            scheme: None,
            source_override: Some(source_url.into()),
        });
    }

    /// Applies [`Self::parse_cache_enabled`] to the process-wide parse cache.
    pub fn apply_parse_cache_setting(&self) {
        if self.parse_cache_enabled {
            crate::version::parse_cache::enable();
        } else {
            crate::version::parse_cache::disable();
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_for_process()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_cache_dir_and_enabled_parse_cache() {
        let config = Config::default_for_process();
        assert!(config.parse_cache_enabled);
        assert!(!config.cache_dir.as_os_str().is_empty());
    }

    #[test]
    fn env_var_overrides_default_cache_dir() {
        // SAFETY: test-only, single-threaded access to this process-wide env var guarded
        // by `serial_test` at the call site in the integration suite; this unit test only
        // checks the read-back, not concurrent mutation.
        unsafe {
            std::env::set_var(CACHE_DIR_ENV_VAR, "/tmp/depsolve-test-cache");
        }
        let config = Config::default_for_process();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/depsolve-test-cache"));
        unsafe {
            std::env::remove_var(CACHE_DIR_ENV_VAR);
        }
    }

    #[test]
    fn serde_round_trips_through_json() {
        let mut config = Config::default_for_process();
        config.register_deduction_pattern("github.com/", r"^(?P<root>[^/]+/[^/]+)(?P<source>.*)$");
        config.register_fixed_source("example.com/pinned", "file:///srv/pinned");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.deduction_patterns.len(), 2);
        assert_eq!(parsed.lock_timeout, config.lock_timeout);
        assert_eq!(parsed.deduction_patterns[1].source_override.as_deref(), Some("file:///srv/pinned"));
    }
}
