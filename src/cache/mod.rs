//! The on-disk source cache: one working tree per source, laid out under
//! `<cache-root>/sources/<sanitized-url>/`.
//!
//! Every operation against a given source is serialized through [`CacheLock`] (one lock
//! file per source, acquired for the duration of the operation); distinct sources proceed
//! in parallel. A source here has exactly one gateway and one working tree, never a pool
//! of parallel worktrees for the same source.

pub mod lock;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::core::error::{ResolverError, Result};
use lock::CacheLock;

/// Caps concurrent subprocess-heavy cache operations (clone/checkout), independent of how
/// many distinct sources a caller drives at once. Sized as a small multiple of available
/// parallelism, built on `std::sync::LazyLock` rather than `once_cell`, now that it is
/// stable.
static CACHE_SEMAPHORE: LazyLock<Semaphore> =
    LazyLock::new(|| Semaphore::new(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4) * 3));

/// Turns a source URL into a filesystem-safe directory name, keeping it human-readable
/// for diagnostics (`github.com-foo-bar` rather than a bare hash).
#[must_use]
pub fn sanitize_source_url(url: &str) -> String {
    let trimmed = url.trim_start_matches("https://").trim_start_matches("http://").trim_start_matches("git://").trim_start_matches("ssh://");
    let sanitized: String =
        trimmed.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' }).collect();
    sanitized.trim_matches('-').to_string()
}

/// The on-disk source cache rooted at a single directory.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    lock_timeout: Duration,
}

impl Cache {
    /// Builds a cache handle rooted at `root`, with the default per-source lock timeout.
    /// Does not touch the filesystem.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root, lock_timeout: crate::constants::default_lock_timeout() }
    }

    /// Builds a cache handle rooted at `root`, bounding [`Self::lock_source`] by
    /// `lock_timeout` instead of the default.
    #[must_use]
    pub fn with_lock_timeout(root: PathBuf, lock_timeout: Duration) -> Self {
        Self { root, lock_timeout }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory all source working trees live under.
    #[must_use]
    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    /// The working-tree path for `source_url`, stable across calls for the same URL.
    #[must_use]
    pub fn working_dir_for(&self, source_url: &str) -> PathBuf {
        self.sources_dir().join(sanitize_source_url(source_url))
    }

    /// Ensures the cache root (and `sources/`) exist on disk.
    pub async fn ensure_cache_dir(&self) -> Result<()> {
        let sources_dir = self.sources_dir();
        tokio::fs::create_dir_all(&sources_dir)
            .await
            .map_err(|e| ResolverError::Io { path: sources_dir.display().to_string(), source: e })
    }

    /// Acquires the per-source lock for `source_url`, serializing all gateway operations
    /// against it. Distinct sources acquire distinct locks and proceed in parallel. Gives
    /// up with an error after [`Self::lock_timeout`] instead of blocking indefinitely
    /// behind a stuck sibling process.
    pub async fn lock_source(&self, source_url: &str) -> Result<CacheLock> {
        CacheLock::acquire_with_timeout(&self.sources_dir(), &sanitize_source_url(source_url), self.lock_timeout).await.map_err(ResolverError::Other)
    }

    /// The timeout [`Self::lock_source`] enforces.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Acquires a cache-wide semaphore permit bounding concurrent subprocess-heavy
    /// operations (clone, checkout), independent of per-source locking.
    pub async fn acquire_subprocess_slot(&self) -> tokio::sync::SemaphorePermit<'static> {
        CACHE_SEMAPHORE.acquire().await.expect("cache semaphore is never closed")
    }

    /// Reports the total size, in bytes, of everything under the cache root.
    pub async fn cache_size(&self) -> Result<u64> {
        fn walk_size(dir: &Path) -> std::io::Result<u64> {
            let mut total = 0;
            if !dir.exists() {
                return Ok(0);
            }
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if metadata.is_dir() {
                    total += walk_size(&entry.path())?;
                } else {
                    total += metadata.len();
                }
            }
            Ok(total)
        }
        let root = self.root.clone();
        let root_for_err = root.clone();
        tokio::task::spawn_blocking(move || walk_size(&root))
            .await
            .map_err(|e| ResolverError::Other(anyhow::anyhow!("cache size task panicked: {e}")))?
            .map_err(|e| ResolverError::Io { path: root_for_err.display().to_string(), source: e })
    }

    /// Removes every source working tree, leaving the cache root itself (and the
    /// `sm.lock` exclusivity file next to it) intact.
    pub async fn clear_all(&self) -> Result<()> {
        let sources_dir = self.sources_dir();
        if sources_dir.exists() {
            tokio::fs::remove_dir_all(&sources_dir)
                .await
                .map_err(|e| ResolverError::Io { path: sources_dir.display().to_string(), source: e })?;
        }
        self.ensure_cache_dir().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_scheme_and_replaces_separators() {
        assert_eq!(sanitize_source_url("https://github.com/foo/bar.git"), "github.com-foo-bar.git");
        assert_eq!(sanitize_source_url("git@example.com:foo/bar.git"), "git-example.com-foo-bar.git");
    }

    #[tokio::test]
    async fn ensure_cache_dir_creates_sources_subdir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = Cache::new(tmp.path().join("cache-root"));
        cache.ensure_cache_dir().await.unwrap();
        assert!(cache.sources_dir().is_dir());
    }

    #[tokio::test]
    async fn working_dir_for_is_stable_and_distinct() {
        let cache = Cache::new(PathBuf::from("/tmp/whatever"));
        let a = cache.working_dir_for("https://github.com/foo/a.git");
        let b = cache.working_dir_for("https://github.com/foo/b.git");
        assert_ne!(a, b);
        assert_eq!(a, cache.working_dir_for("https://github.com/foo/a.git"));
    }
}
