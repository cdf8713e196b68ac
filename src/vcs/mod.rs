//! Per-VCS gateways: the "capability set" the design notes describe as a polymorphic
//! interface with a sum-type discriminator rather than open inheritance. Each
//! variant of [`Vcs`] holds its own gateway state (working directory, remote URL) and
//! implements the same contract directly; [`Vcs`] dispatches to whichever variant a
//! source was configured with.

pub mod bzr;
pub mod git;
pub mod gopkg;
pub mod hg;
pub mod process;
pub mod svn;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::core::error::{Cancelled, ResolverError, Result};

/// One named version a VCS gateway can see, paired with the revision it currently
/// resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// The tag or branch name.
    pub name: String,
    /// The revision (commit hash, or numeric revision for Subversion) it points to.
    pub revision: String,
    /// Whether this ref is a branch (`true`) or a tag (`false`).
    pub is_branch: bool,
    /// Whether this is the source's default branch. Always `false` for tags.
    pub is_default: bool,
}

/// Metadata about a single commit, returned by `commit_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// The full revision identifier.
    pub revision: String,
    /// Author name/email as reported by the VCS, opaque to this crate.
    pub author: String,
    /// Commit timestamp.
    pub date: DateTime<Utc>,
    /// The commit message's first line.
    pub summary: String,
}

/// Either a successful gateway result or a cancellation outcome, collapsing the
/// subprocess-level [`process::ProcessOutcome::Cancelled`] case into a single place
/// gateway methods can propagate with `?` via [`Cancelled`].
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// A gateway-level failure: either a [`crate::core::error::ResolverError`] or
/// cancellation, kept distinct so call sites never accidentally match one as the other.
#[derive(Debug)]
pub enum GatewayError {
    /// A resolver-level failure (unreachable remote, corrupt cache, etc.).
    Resolver(crate::core::error::ResolverError),
    /// The operation was cancelled.
    Cancelled,
}

impl From<crate::core::error::ResolverError> for GatewayError {
    fn from(e: crate::core::error::ResolverError) -> Self {
        GatewayError::Resolver(e)
    }
}

impl From<process::CancelOr<crate::core::error::ResolverError>> for GatewayError {
    fn from(e: process::CancelOr<crate::core::error::ResolverError>) -> Self {
        match e {
            process::CancelOr::Err(e) => GatewayError::Resolver(e),
            process::CancelOr::Cancelled(Cancelled) => GatewayError::Cancelled,
        }
    }
}

impl GatewayError {
    /// Converts into the crate-wide [`Result`], treating cancellation as `Cancelled`.
    pub fn into_resolver_result<T>(result: GatewayResult<T>) -> Result<std::result::Result<T, Cancelled>> {
        match result {
            Ok(v) => Ok(Ok(v)),
            Err(GatewayError::Resolver(e)) => Err(e),
            Err(GatewayError::Cancelled) => Ok(Err(Cancelled)),
        }
    }
}

/// Which VCS a source uses, plus its gateway state.
///
/// The gopkg.in-style major-version filter is not its own enum variant: it wraps
/// a `Vcs::Git` gateway and post-filters `list_refs`, matching the design's description
/// of it as "a specialized git gateway" rather than a fifth VCS.
#[derive(Debug, Clone)]
pub enum Vcs {
    /// Git, via the system `git` binary.
    Git(git::GitGateway),
    /// Mercurial, via the system `hg` binary.
    Mercurial(hg::HgGateway),
    /// Bazaar, via the system `bzr` binary.
    Bazaar(bzr::BzrGateway),
    /// Subversion, via the system `svn` binary.
    Subversion(svn::SvnGateway),
}

impl Vcs {
    /// Returns the local working-directory path this gateway operates on.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        match self {
            Vcs::Git(g) => g.working_dir(),
            Vcs::Mercurial(g) => g.working_dir(),
            Vcs::Bazaar(g) => g.working_dir(),
            Vcs::Subversion(g) => g.working_dir(),
        }
    }

    /// Initial clone from `remote_url` into this gateway's working directory.
    pub async fn get(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        match self {
            Vcs::Git(g) => g.get(remote_url, cancel).await,
            Vcs::Mercurial(g) => g.get(remote_url, cancel).await,
            Vcs::Bazaar(g) => g.get(remote_url, cancel).await,
            Vcs::Subversion(g) => g.get(remote_url, cancel).await,
        }
    }

    /// Updates the local cache from the remote without changing the checked-out version.
    pub async fn fetch(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        match self {
            Vcs::Git(g) => g.fetch(cancel).await,
            Vcs::Mercurial(g) => g.fetch(cancel).await,
            Vcs::Bazaar(g) => g.fetch(cancel).await,
            Vcs::Subversion(g) => g.fetch(cancel).await,
        }
    }

    /// Checks out `revision_spec` (a tag, branch, or raw revision) in the working tree.
    pub async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        match self {
            Vcs::Git(g) => g.update_version(revision_spec, cancel).await,
            Vcs::Mercurial(g) => g.update_version(revision_spec, cancel).await,
            Vcs::Bazaar(g) => g.update_version(revision_spec, cancel).await,
            Vcs::Subversion(g) => g.update_version(revision_spec, cancel).await,
        }
    }

    /// Returns true if the working directory holds a valid checkout for this VCS.
    #[must_use]
    pub fn check_local(&self) -> bool {
        match self {
            Vcs::Git(g) => g.check_local(),
            Vcs::Mercurial(g) => g.check_local(),
            Vcs::Bazaar(g) => g.check_local(),
            Vcs::Subversion(g) => g.check_local(),
        }
    }

    /// Returns true if the remote is reachable.
    pub async fn ping(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match self {
            Vcs::Git(g) => g.ping(remote_url, cancel).await,
            Vcs::Mercurial(g) => g.ping(remote_url, cancel).await,
            Vcs::Bazaar(g) => g.ping(remote_url, cancel).await,
            Vcs::Subversion(g) => g.ping(remote_url, cancel).await,
        }
    }

    /// Returns metadata for `revision`.
    pub async fn commit_info(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<CommitInfo> {
        match self {
            Vcs::Git(g) => g.commit_info(revision, cancel).await,
            Vcs::Mercurial(g) => g.commit_info(revision, cancel).await,
            Vcs::Bazaar(g) => g.commit_info(revision, cancel).await,
            Vcs::Subversion(g) => g.commit_info(revision, cancel).await,
        }
    }

    /// Lists every tag and branch, paired with its current revision and default-branch
    /// status. `remote_url` is used by every backend
    /// except git, which lists directly from the remote without needing a local clone.
    pub async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<Vec<RemoteRef>> {
        match self {
            Vcs::Git(g) => g.list_refs(remote_url, cancel).await,
            Vcs::Mercurial(g) => g.list_refs(remote_url, cancel).await,
            Vcs::Bazaar(g) => g.list_refs(remote_url, cancel).await,
            Vcs::Subversion(g) => g.list_refs(remote_url, cancel).await,
        }
    }

    /// Lists tags reachable from `revision`.
    pub async fn tags_from_commit(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<Vec<String>> {
        match self {
            Vcs::Git(g) => g.tags_from_commit(revision, cancel).await,
            Vcs::Mercurial(g) => g.tags_from_commit(revision, cancel).await,
            Vcs::Bazaar(g) => g.tags_from_commit(revision, cancel).await,
            Vcs::Subversion(g) => g.tags_from_commit(revision, cancel).await,
        }
    }

    /// Returns true if `spec` names a ref or revision known to this VCS.
    pub async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match self {
            Vcs::Git(g) => g.is_reference(spec, cancel).await,
            Vcs::Mercurial(g) => g.is_reference(spec, cancel).await,
            Vcs::Bazaar(g) => g.is_reference(spec, cancel).await,
            Vcs::Subversion(g) => g.is_reference(spec, cancel).await,
        }
    }

    /// Returns true if the working directory has local modifications.
    pub async fn is_dirty(&self, cancel: &CancellationToken) -> GatewayResult<bool> {
        match self {
            Vcs::Git(g) => g.is_dirty(cancel).await,
            Vcs::Mercurial(g) => g.is_dirty(cancel).await,
            Vcs::Bazaar(g) => g.is_dirty(cancel).await,
            Vcs::Subversion(g) => g.is_dirty(cancel).await,
        }
    }

    /// Returns the checked-out revision's commit date.
    pub async fn date(&self, cancel: &CancellationToken) -> GatewayResult<DateTime<Utc>> {
        match self {
            Vcs::Git(g) => g.date(cancel).await,
            Vcs::Mercurial(g) => g.date(cancel).await,
            Vcs::Bazaar(g) => g.date(cancel).await,
            Vcs::Subversion(g) => g.date(cancel).await,
        }
    }

    /// Materializes a clean copy of the currently checked-out tree at `target_dir`,
    /// stripped of VCS metadata.
    pub async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> GatewayResult<()> {
        match self {
            Vcs::Git(g) => g.export_dir(target_dir, cancel).await,
            Vcs::Mercurial(g) => g.export_dir(target_dir, cancel).await,
            Vcs::Bazaar(g) => g.export_dir(target_dir, cancel).await,
            Vcs::Subversion(g) => g.export_dir(target_dir, cancel).await,
        }
    }

    /// Creates an empty repository at the working directory (used by tests to build
    /// local `file://` fixtures).
    pub async fn init(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        match self {
            Vcs::Git(g) => g.init(cancel).await,
            Vcs::Mercurial(g) => g.init(cancel).await,
            Vcs::Bazaar(g) => g.init(cancel).await,
            Vcs::Subversion(g) => g.init(cancel).await,
        }
    }

    /// Runs the git-specific "submodule sync + aggressive clean" sequence after a
    /// version update, a no-op for every other VCS: git additionally runs a defensive
    /// sequence after every version update.
    pub async fn post_update_clean(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        if let Vcs::Git(g) = self {
            g.submodule_sync_and_clean(cancel).await
        } else {
            Ok(())
        }
    }

    /// A stable short name for diagnostics and cache-key derivation (`"git"`, `"hg"`,
    /// `"bzr"`, `"svn"`).
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Vcs::Git(_) => "git",
            Vcs::Mercurial(_) => "hg",
            Vcs::Bazaar(_) => "bzr",
            Vcs::Subversion(_) => "svn",
        }
    }
}

/// Classifies a failed `update_version`/checkout as either "this revision genuinely isn't
/// present" (cache-recoverable — the solver blacklists just that revision) or
/// "something else is wrong with the local working tree or the request" (propagated,
/// since blacklisting a single revision wouldn't fix it). The underlying tool's own error
/// text is the only signal available here, so this is necessarily a heuristic rather than
/// a structured status code — every gateway's own "no such revision" phrasing is matched
/// rather than assumed to be git's.
#[must_use]
pub fn classify_checkout_failure(source: &str, revision_spec: &str, err: &ResolverError) -> ResolverError {
    const MISSING_REVISION_MARKERS: &[&str] = &[
        "pathspec",
        "did not match any",
        "unknown revision",
        "no such revision",
        "unknown tag",
        "unknown branch",
        "no changeset found",
        "doesn't exist",
        "does not exist",
        "invalid revision",
        "no such file or directory in revision",
    ];
    const AUTH_FAILURE_MARKERS: &[&str] =
        &["permission denied (publickey)", "authentication failed", "could not read username", "403 forbidden", "401 unauthorized", "access denied"];
    let text = err.to_string().to_lowercase();
    if AUTH_FAILURE_MARKERS.iter().any(|needle| text.contains(needle)) {
        ResolverError::AuthenticationFailed { source: source.to_string() }
    } else if MISSING_REVISION_MARKERS.iter().any(|needle| text.contains(needle)) {
        ResolverError::RevisionNotFound { source: source.to_string(), revision: revision_spec.to_string() }
    } else {
        ResolverError::CacheCorrupt { source: source.to_string(), reason: err.to_string() }
    }
}

/// Builds a [`Vcs`] gateway of `kind` rooted at `working_dir`.
#[must_use]
pub fn new_gateway(kind: VcsKind, working_dir: PathBuf) -> Vcs {
    match kind {
        VcsKind::Git => Vcs::Git(git::GitGateway::new(working_dir)),
        VcsKind::Mercurial => Vcs::Mercurial(hg::HgGateway::new(working_dir)),
        VcsKind::Bazaar => Vcs::Bazaar(bzr::BzrGateway::new(working_dir)),
        VcsKind::Subversion => Vcs::Subversion(svn::SvnGateway::new(working_dir)),
    }
}

/// The VCS discriminator, independent of any gateway state — used when a caller (or the
/// source deduction chain) needs to name a VCS before a working directory exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsKind {
    /// Git.
    Git,
    /// Mercurial.
    Mercurial,
    /// Bazaar.
    Bazaar,
    /// Subversion.
    Subversion,
}
