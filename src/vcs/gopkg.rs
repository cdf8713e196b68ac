//! The gopkg.in-style major-version filter: not a fifth VCS, but a wrapper that
//! post-filters a [`git::GitGateway`]'s refs to the ones matching a pinned major
//! version. A source configured as e.g. `gopkg.in/yaml.v2` only ever reports
//! versions whose tag parses as a semver (or plain branch name) with major component `2`;
//! the highest matching version becomes the reported default.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::git::GitGateway;
use super::{CommitInfo, GatewayResult, RemoteRef};

/// Wraps a [`GitGateway`], filtering [`list_refs`](Self::list_refs) down to the pinned
/// major version. Every other operation delegates unchanged to the inner gateway.
#[derive(Debug, Clone)]
pub struct GopkgGateway {
    inner: GitGateway,
    major: u64,
}

impl GopkgGateway {
    #[must_use]
    pub fn new(inner: GitGateway, major: u64) -> Self {
        Self { inner, major }
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.inner.working_dir()
    }

    pub async fn get(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        self.inner.get(remote_url, cancel).await
    }

    pub async fn fetch(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.inner.fetch(cancel).await
    }

    pub async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        self.inner.update_version(revision_spec, cancel).await
    }

    #[must_use]
    pub fn check_local(&self) -> bool {
        self.inner.check_local()
    }

    pub async fn ping(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        self.inner.ping(remote_url, cancel).await
    }

    pub async fn commit_info(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<CommitInfo> {
        self.inner.commit_info(revision, cancel).await
    }

    /// Filters refs to those whose name parses with major version [`Self::major`],
    /// re-deriving the default flag among the surviving set (highest version wins,
    /// ties broken the same way [`GitGateway::list_refs`] breaks branch ties).
    pub async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<Vec<RemoteRef>> {
        let all = self.inner.list_refs(remote_url, cancel).await?;
        let mut matching: Vec<RemoteRef> =
            all.into_iter().filter(|r| ref_major(&r.name) == Some(self.major)).map(|mut r| { r.is_default = false; r }).collect();

        if let Some(highest_idx) = matching
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_branch)
            .max_by(|(_, a), (_, b)| crate::version::Version::parse_tag(&a.name).cmp(&crate::version::Version::parse_tag(&b.name)))
            .map(|(i, _)| i)
        {
            matching[highest_idx].is_default = true;
        }

        Ok(matching)
    }

    pub async fn tags_from_commit(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<Vec<String>> {
        let tags = self.inner.tags_from_commit(revision, cancel).await?;
        Ok(tags.into_iter().filter(|t| ref_major(t) == Some(self.major)).collect())
    }

    pub async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        self.inner.is_reference(spec, cancel).await
    }

    pub async fn is_dirty(&self, cancel: &CancellationToken) -> GatewayResult<bool> {
        self.inner.is_dirty(cancel).await
    }

    pub async fn date(&self, cancel: &CancellationToken) -> GatewayResult<chrono::DateTime<chrono::Utc>> {
        self.inner.date(cancel).await
    }

    pub async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> GatewayResult<()> {
        self.inner.export_dir(target_dir, cancel).await
    }

    pub async fn init(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.inner.init(cancel).await
    }

    /// Delegates to the inner git gateway's post-checkout submodule sync + clean.
    pub async fn post_update_clean(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.inner.submodule_sync_and_clean(cancel).await
    }
}

/// Extracts the major version component from a tag name like `v2.3.1` or `2.0`, if it
/// parses as a version at all.
fn ref_major(name: &str) -> Option<u64> {
    match crate::version::Version::parse_tag(name) {
        crate::version::Version::Semver(v) => Some(v.major),
        _ => None,
    }
}

/// Extracts the declared major version from a `gopkg.in`-style source URL, e.g.
/// `gopkg.in/yaml.v2` or `gopkg.in/go-yaml/yaml.v2` both yield `Some(2)`. Returns `None`
/// for any URL that doesn't point at `gopkg.in` or whose final path segment lacks a
/// `.vN` suffix.
#[must_use]
pub fn major_from_gopkg_url(url: &str) -> Option<u64> {
    if !url.contains("gopkg.in/") {
        return None;
    }
    let last_segment = url.rsplit('/').next()?;
    let (_, version_part) = last_segment.rsplit_once(".v")?;
    version_part.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_major_reads_leading_v_and_bare_versions() {
        assert_eq!(ref_major("v2.3.1"), Some(2));
        assert_eq!(ref_major("2.0.0"), Some(2));
        assert_eq!(ref_major("not-a-version"), None);
    }

    #[test]
    fn gopkg_major_parses_short_and_long_form_urls() {
        assert_eq!(major_from_gopkg_url("https://gopkg.in/yaml.v2"), Some(2));
        assert_eq!(major_from_gopkg_url("https://gopkg.in/go-yaml/yaml.v3"), Some(3));
        assert_eq!(major_from_gopkg_url("https://github.com/go-yaml/yaml"), None);
        assert_eq!(major_from_gopkg_url("https://gopkg.in/noversion"), None);
    }
}
