//! Timeout and sizing constants shared across the resolver.

use std::time::Duration;

/// Default timeout for cache-root lock acquisition.
pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Starting delay for exponential backoff when retrying a held per-source cache lock.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Cap on exponential backoff delay between per-source cache lock retries.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Timeout for a single VCS fetch/update operation.
pub const VCS_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a single VCS clone operation.
pub const VCS_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Number of bytes read from the front of a source file when scanning for package name
/// and import declarations (see the package analyzer's bounded header read).
pub const HEADER_SCAN_BYTES: usize = 4096;
