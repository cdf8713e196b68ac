//! The source manager: uniform, cached, cancellable access to remote sources regardless
//! of underlying VCS. Everything the solver needs — listing versions, checking out
//! a tree, deriving a manifest — flows through [`SourceManager`], which serializes
//! operations per-source while letting distinct sources proceed in parallel.

pub mod deduce;
pub mod manager_lock;
pub mod supervisor;

use std::path::Path;

use dashmap::DashMap;
use semver::Version as SemverVersion;
use tokio_util::sync::CancellationToken;

use crate::analyzer::{self, PackageTree};
use crate::cache::Cache;
use crate::config::Config;
use crate::core::error::{Cancelled, ResolverError, Result};
use crate::core::plugin::Analyzer;
use crate::lockfile::Lock;
use crate::manifest::Manifest;
use crate::vcs::git::GitGateway;
use crate::vcs::gopkg::{major_from_gopkg_url, GopkgGateway};
use crate::vcs::{self, RemoteRef, Vcs, VcsKind};
use crate::version::Version;
use manager_lock::ManagerLock;
use supervisor::{OperationKind, Supervisor};

pub use deduce::DeducedSource;

/// Identifies one remote source: a fetch URL plus which VCS it speaks. Distinct from
/// [`crate::core::project::ProjectId`], which identifies a *project* (which may share a
/// source with other projects, or move between sources across a manifest edit).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub url: String,
    pub vcs: VcsKind,
}

impl SourceRef {
    #[must_use]
    pub fn new(url: impl Into<String>, vcs: VcsKind) -> Self {
        Self { url: url.into(), vcs }
    }
}

/// A version paired with the remote ref it was derived from, as returned by
/// [`SourceManager::list_versions`]. The solver sorts and filters this list itself per
/// its own ordering policy; the source manager makes no ordering promises.
#[derive(Debug, Clone)]
pub struct CandidateVersion {
    pub version: Version,
    pub revision: String,
    pub is_branch: bool,
}

/// The gateway a source resolves to: either a plain per-VCS gateway, or (for
/// `gopkg.in`-style sources) a git gateway wrapped in [`GopkgGateway`]'s major-version
/// filter. Kept internal to the source manager — callers only ever see [`SourceRef`].
#[derive(Debug, Clone)]
enum Gateway {
    Vcs(Vcs),
    Gopkg(GopkgGateway),
}

impl Gateway {
    fn working_dir(&self) -> &Path {
        match self {
            Gateway::Vcs(v) => v.working_dir(),
            Gateway::Gopkg(g) => g.working_dir(),
        }
    }

    async fn get(&self, remote_url: &str, cancel: &CancellationToken) -> vcs::GatewayResult<()> {
        match self {
            Gateway::Vcs(v) => v.get(remote_url, cancel).await,
            Gateway::Gopkg(g) => g.get(remote_url, cancel).await,
        }
    }

    async fn fetch(&self, cancel: &CancellationToken) -> vcs::GatewayResult<()> {
        match self {
            Gateway::Vcs(v) => v.fetch(cancel).await,
            Gateway::Gopkg(g) => g.fetch(cancel).await,
        }
    }

    async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> vcs::GatewayResult<()> {
        match self {
            Gateway::Vcs(v) => v.update_version(revision_spec, cancel).await,
            Gateway::Gopkg(g) => g.update_version(revision_spec, cancel).await,
        }
    }

    fn check_local(&self) -> bool {
        match self {
            Gateway::Vcs(v) => v.check_local(),
            Gateway::Gopkg(g) => g.check_local(),
        }
    }

    async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> vcs::GatewayResult<Vec<RemoteRef>> {
        match self {
            Gateway::Vcs(v) => v.list_refs(remote_url, cancel).await,
            Gateway::Gopkg(g) => g.list_refs(remote_url, cancel).await,
        }
    }

    async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> vcs::GatewayResult<()> {
        match self {
            Gateway::Vcs(v) => v.export_dir(target_dir, cancel).await,
            Gateway::Gopkg(g) => g.export_dir(target_dir, cancel).await,
        }
    }

    async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> vcs::GatewayResult<bool> {
        match self {
            Gateway::Vcs(v) => v.is_reference(spec, cancel).await,
            Gateway::Gopkg(g) => g.is_reference(spec, cancel).await,
        }
    }

    async fn post_update_clean(&self, cancel: &CancellationToken) -> vcs::GatewayResult<()> {
        match self {
            Gateway::Vcs(v) => v.post_update_clean(cancel).await,
            Gateway::Gopkg(g) => g.post_update_clean(cancel).await,
        }
    }
}

/// Uniform, cached, cancellable access to remote sources.
pub struct SourceManager {
    cache: Cache,
    supervisor: Supervisor,
    config: Config,
    http: reqwest::Client,
    deduction_cache: DashMap<String, DeducedSource>,
    _manager_lock: ManagerLock,
}

impl SourceManager {
    /// Builds a source manager rooted at `config.cache_dir`, acquiring the single
    /// per-cache-directory manager lock (fails fast if another process already holds it)
    /// and applying `config`'s parse-cache setting.
    pub async fn new(config: Config) -> Result<Self> {
        let cache = Cache::with_lock_timeout(config.cache_dir.clone(), config.lock_timeout);
        cache.ensure_cache_dir().await?;
        let manager_lock = ManagerLock::acquire(&config.cache_dir).await?;
        config.apply_parse_cache_setting();
        Ok(Self {
            cache,
            supervisor: Supervisor::new(),
            config,
            http: reqwest::Client::new(),
            deduction_cache: DashMap::new(),
            _manager_lock: manager_lock,
        })
    }

    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Deduces a project root and source for `import_path`: first via the registered
    /// pattern chain, then (if none match) via an HTML meta-import fetch against the
    /// host. Results are cached for the manager's lifetime, keyed on `import_path`, so a
    /// project imported from many packages only ever triggers one meta-import fetch.
    pub async fn deduce_project_root(&self, import_path: &str) -> Result<DeducedSource> {
        if let Some(deduced) = self.deduction_cache.get(import_path) {
            return Ok(deduced.clone());
        }
        let deduced = match deduce::deduce_from_patterns(import_path, &self.config.deduction_patterns) {
            Some(deduced) => deduced,
            None => deduce::deduce_from_meta_import(import_path, &self.http).await?,
        };
        self.deduction_cache.insert(import_path.to_string(), deduced.clone());
        Ok(deduced)
    }

    /// Builds the gateway for `source`, transparently substituting [`GopkgGateway`] for
    /// plain git when the URL declares a `gopkg.in`-style pinned major version.
    fn gateway_for(&self, source: &SourceRef) -> Gateway {
        let working_dir = self.cache.working_dir_for(&source.url);
        if source.vcs == VcsKind::Git {
            if let Some(major) = major_from_gopkg_url(&source.url) {
                return Gateway::Gopkg(GopkgGateway::new(GitGateway::new(working_dir), major));
            }
        }
        Gateway::Vcs(vcs::new_gateway(source.vcs, working_dir))
    }

    /// Returns true if the local cache already holds a valid checkout for `source`.
    #[must_use]
    pub fn source_exists(&self, source: &SourceRef) -> bool {
        self.gateway_for(source).check_local()
    }

    /// Ensures the local cache is byte-equivalent to upstream: clones if absent, fetches
    /// otherwise. Serialized per-source via the cache's lock file.
    pub async fn sync_source_for(&self, source: &SourceRef, cancel: &CancellationToken) -> Result<std::result::Result<(), Cancelled>> {
        let _lock = self.cache.lock_source(&source.url).await?;
        let _permit = self.cache.acquire_subprocess_slot().await;
        let _guard = self.supervisor.begin(source.url.clone(), OperationKind::Fetch);
        let child = self.supervisor.child_token(cancel);
        let gateway = self.gateway_for(source);

        let result = if gateway.check_local() { gateway.fetch(&child).await } else { gateway.get(&source.url, &child).await };
        self.gateway_outcome(result)
    }

    /// Lists every tag and branch for `source`, each paired with its current revision.
    /// Never sorted; the solver applies its own candidate ordering policy.
    pub async fn list_versions(&self, source: &SourceRef, cancel: &CancellationToken) -> Result<std::result::Result<Vec<CandidateVersion>, Cancelled>> {
        let _lock = self.cache.lock_source(&source.url).await?;
        let _guard = self.supervisor.begin(source.url.clone(), OperationKind::ListVersions);
        let child = self.supervisor.child_token(cancel);
        let gateway = self.gateway_for(source);

        match self.gateway_outcome(gateway.list_refs(&source.url, &child).await)? {
            Ok(refs) => Ok(Ok(refs.into_iter().map(Self::candidate_from_ref).collect())),
            Err(c) => Ok(Err(c)),
        }
    }

    fn candidate_from_ref(remote: RemoteRef) -> CandidateVersion {
        let symbolic = if remote.is_branch {
            Version::Branch { name: remote.name, is_default: remote.is_default }
        } else {
            Version::parse_tag(&remote.name)
        };
        let version = Version::paired(symbolic, remote.revision.clone()).unwrap_or(Version::Revision(remote.revision.clone()));
        CandidateVersion { version, revision: remote.revision, is_branch: remote.is_branch }
    }

    /// Returns true if `revision` exists upstream for `source`.
    pub async fn revision_present_in(&self, source: &SourceRef, revision: &str, cancel: &CancellationToken) -> Result<std::result::Result<bool, Cancelled>> {
        let _lock = self.cache.lock_source(&source.url).await?;
        let child = self.supervisor.child_token(cancel);
        let gateway = self.gateway_for(source);
        self.gateway_outcome(gateway.is_reference(revision, &child).await)
    }

    /// Checks out `version` in the source's cached working tree and returns its package
    /// tree, as computed by [`analyzer::walk`].
    pub async fn list_packages(
        &self,
        source: &SourceRef,
        version: &Version,
        project_root: &str,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<PackageTree, Cancelled>> {
        let _lock = self.cache.lock_source(&source.url).await?;
        let _permit = self.cache.acquire_subprocess_slot().await;
        let _guard = self.supervisor.begin(source.url.clone(), OperationKind::ListPackages);
        let child = self.supervisor.child_token(cancel);
        let gateway = self.gateway_for(source);

        let revision_spec = Self::revision_spec_for(version);
        if let Err(outcome) = self.checkout(&gateway, &source.url, &revision_spec, &child).await? {
            return Ok(Err(outcome));
        }

        let working_dir = gateway.working_dir().to_path_buf();
        Ok(Ok(analyzer::walk(&working_dir, project_root)))
    }

    /// Checks out `version` and hands the working directory to `analyzer` to derive a
    /// manifest and lock.
    pub async fn get_manifest_and_lock(
        &self,
        source: &SourceRef,
        version: &Version,
        project_root: &str,
        analyzer: &dyn Analyzer,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<(Manifest, Lock), Cancelled>> {
        let _lock = self.cache.lock_source(&source.url).await?;
        let _permit = self.cache.acquire_subprocess_slot().await;
        let _guard = self.supervisor.begin(source.url.clone(), OperationKind::DeriveManifest);
        let child = self.supervisor.child_token(cancel);
        let gateway = self.gateway_for(source);

        let revision_spec = Self::revision_spec_for(version);
        if let Err(outcome) = self.checkout(&gateway, &source.url, &revision_spec, &child).await? {
            return Ok(Err(outcome));
        }

        let project = crate::core::project::ProjectId::with_source(project_root, source.url.clone());
        let (manifest, lock) = analyzer.derive_manifest_and_lock(&project, gateway.working_dir())?;
        if manifest.dependencies.contains_key(project_root) {
            return Err(ResolverError::InvariantViolation {
                analyzer: analyzer.info().name.to_string(),
                reason: format!("project `{project_root}` declares a dependency on itself"),
            });
        }
        Ok(Ok((manifest, lock)))
    }

    /// Materializes a clean, VCS-metadata-free copy of `version`'s checked-out tree at
    /// `target_dir`.
    pub async fn export_project(&self, source: &SourceRef, version: &Version, target_dir: &Path, cancel: &CancellationToken) -> Result<std::result::Result<(), Cancelled>> {
        let _lock = self.cache.lock_source(&source.url).await?;
        let _permit = self.cache.acquire_subprocess_slot().await;
        let _guard = self.supervisor.begin(source.url.clone(), OperationKind::Export);
        let child = self.supervisor.child_token(cancel);
        let gateway = self.gateway_for(source);

        let revision_spec = Self::revision_spec_for(version);
        if let Err(outcome) = self.checkout(&gateway, &source.url, &revision_spec, &child).await? {
            return Ok(Err(outcome));
        }
        self.gateway_outcome(gateway.export_dir(target_dir, &child).await)
    }

    /// The spec handed to `update_version`/`checkout`: the paired revision if `version`
    /// carries one, otherwise its symbolic name (a branch or plain tag with no revision
    /// attached, e.g. one constructed directly rather than returned from
    /// [`Self::list_versions`]).
    fn revision_spec_for(version: &Version) -> String {
        version.revision().map(str::to_string).unwrap_or_else(|| version.symbolic().to_string())
    }

    async fn checkout(&self, gateway: &Gateway, remote_url: &str, revision_spec: &str, cancel: &CancellationToken) -> Result<std::result::Result<(), Cancelled>> {
        if !gateway.check_local() {
            if let Err(outcome) = self.gateway_outcome(gateway.get(remote_url, cancel).await)? {
                return Ok(Err(outcome));
            }
        }
        if let Err(outcome) = self.gateway_outcome(gateway.update_version(revision_spec, cancel).await)? {
            return Ok(Err(outcome));
        }
        self.gateway_outcome(gateway.post_update_clean(cancel).await)
    }

    fn gateway_outcome<T>(&self, result: vcs::GatewayResult<T>) -> Result<std::result::Result<T, Cancelled>> {
        match result {
            Ok(v) => Ok(Ok(v)),
            Err(vcs::GatewayError::Cancelled) => Ok(Err(Cancelled)),
            Err(vcs::GatewayError::Resolver(e)) => {
                tracing::warn!(target: "source", error = %e, "source-manager operation failed");
                Err(e)
            }
        }
    }

    /// Reports the cache's total on-disk size.
    pub async fn cache_size(&self) -> Result<u64> {
        self.cache.cache_size().await
    }
}

/// Sorts a freshly-listed [`CandidateVersion`] slice per the solver's candidate ordering
/// policy: semvers first (descending unless `downgrade`), then semver prereleases, then
/// branches (default first), then plain tags, then bare revisions.
pub fn sort_candidates(candidates: &mut [CandidateVersion], downgrade: bool) {
    candidates.sort_by(|a, b| candidate_rank(a).cmp(&candidate_rank(b)).then_with(|| compare_within_rank(a, b, downgrade)));
}

fn candidate_rank(candidate: &CandidateVersion) -> u8 {
    match candidate.version.symbolic() {
        Version::Semver(v) if v.pre.is_empty() => 0,
        Version::Semver(_) => 1,
        Version::Branch { .. } => 2,
        Version::Plain(_) => 3,
        Version::Revision(_) => 4,
        Version::Paired { .. } => 5,
    }
}

fn compare_within_rank(a: &CandidateVersion, b: &CandidateVersion, downgrade: bool) -> std::cmp::Ordering {
    let ordering = match (a.version.symbolic(), b.version.symbolic()) {
        (Version::Semver(x), Version::Semver(y)) => semver_cmp(x, y),
        (Version::Branch { name: x, is_default: dx }, Version::Branch { name: y, is_default: dy }) => match (dx, dy) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => x.cmp(y),
        },
        (Version::Plain(x), Version::Plain(y)) => x.cmp(y),
        _ => a.revision.cmp(&b.revision),
    };
    if downgrade { ordering } else { ordering.reverse() }
}

fn semver_cmp(a: &SemverVersion, b: &SemverVersion) -> std::cmp::Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(tag: &str, revision: &str) -> CandidateVersion {
        let symbolic = Version::parse_tag(tag);
        let version = Version::paired(symbolic, revision).unwrap();
        CandidateVersion { version, revision: revision.to_string(), is_branch: false }
    }

    #[test]
    fn sort_candidates_orders_semvers_descending_by_default() {
        let mut candidates = vec![candidate("1.0.0", "a"), candidate("2.0.0", "b"), candidate("1.5.0", "c")];
        sort_candidates(&mut candidates, false);
        let tags: Vec<String> = candidates.iter().map(|c| c.version.symbolic().to_string()).collect();
        assert_eq!(tags, vec!["2.0.0", "1.5.0", "1.0.0"]);
    }

    #[test]
    fn sort_candidates_ascends_under_downgrade() {
        let mut candidates = vec![candidate("2.0.0", "a"), candidate("1.0.0", "b")];
        sort_candidates(&mut candidates, true);
        let tags: Vec<String> = candidates.iter().map(|c| c.version.symbolic().to_string()).collect();
        assert_eq!(tags, vec!["1.0.0", "2.0.0"]);
    }

    #[test]
    fn releases_rank_before_prereleases_before_plain_tags() {
        let mut candidates = vec![candidate("release-name", "a"), candidate("1.0.0-rc.1", "b"), candidate("1.0.0", "c")];
        sort_candidates(&mut candidates, false);
        assert_eq!(candidate_rank(&candidates[0]), 0);
        assert_eq!(candidate_rank(&candidates[1]), 1);
        assert_eq!(candidate_rank(&candidates[2]), 3);
    }
}
