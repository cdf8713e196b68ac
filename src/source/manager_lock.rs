//! The single-manager-per-cache-directory guard: `<cache-root>/sm.lock`, acquired
//! non-blocking at `SourceManager::new` time and held for the manager's lifetime.
//!
//! This is fail-fast, not retry-with-timeout: a
//! second manager pointed at the same cache root gets [`ResolverError::CacheLocked`]
//! immediately. A caller that wants to wait for the other manager to exit implements that
//! retry loop itself.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::core::error::{ResolverError, Result};

/// Holds the exclusive, non-blocking lock on `<cache_dir>/sm.lock` for as long as it is
/// alive. Dropping it releases the lock and leaves the (now-empty) file in place.
pub struct ManagerLock {
    _file: std::fs::File,
    path: PathBuf,
}

impl ManagerLock {
    /// Attempts to acquire the cache root's manager lock, failing immediately (rather
    /// than blocking) if another process already holds it.
    pub async fn acquire(cache_dir: &Path) -> Result<Self> {
        let cache_dir = cache_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&cache_dir).map_err(|e| ResolverError::Io { path: cache_dir.display().to_string(), source: e })?;
            let path = cache_dir.join("sm.lock");
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| ResolverError::Io { path: path.display().to_string(), source: e })?;
            let acquired = file.try_lock_exclusive().map_err(|_| ResolverError::CacheLocked { path: path.display().to_string() })?;
            if !acquired {
                return Err(ResolverError::CacheLocked { path: path.display().to_string() });
            }
            Ok(Self { _file: file, path })
        })
        .await
        .map_err(|e| ResolverError::Other(anyhow::anyhow!("manager lock task panicked: {e}")))?
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquisition_succeeds() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lock = ManagerLock::acquire(tmp.path()).await.unwrap();
        assert!(lock.path().exists());
    }

    #[tokio::test]
    async fn second_acquisition_fails_fast() {
        let tmp = tempfile::TempDir::new().unwrap();
        let _first = ManagerLock::acquire(tmp.path()).await.unwrap();
        let second = ManagerLock::acquire(tmp.path()).await;
        assert!(matches!(second, Err(ResolverError::CacheLocked { .. })));
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let tmp = tempfile::TempDir::new().unwrap();
        {
            let _first = ManagerLock::acquire(tmp.path()).await.unwrap();
        }
        let second = ManagerLock::acquire(tmp.path()).await;
        assert!(second.is_ok());
    }
}
