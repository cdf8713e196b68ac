//! Test utilities shared between this crate's unit tests and its `tests/integration`
//! suite: a thin logging initializer, plus [`git_helper`], a safe wrapper around the
//! system `git` binary used to build throwaway local repositories: tests instead
//! use local `file://` git repositories created on the fly.

pub mod git_helper;
pub mod repo_fixture;

pub use git_helper::TestGit;
pub use repo_fixture::RepoFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests.
static INIT_LOGGING: Once = Once::new();

/// Initializes the tracing subscriber for tests, at most once per process. Respects
/// `RUST_LOG` if set; otherwise uses `level`, or stays silent if neither is given.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().with_target(true).with_thread_ids(false).with_ansi(true).try_init();
    });
}
