//! The git gateway: the primary, most exercised VCS backend (local `file://` fixtures in
//! the integration suite use it directly).

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use super::process::ProcessCommand;
use super::{CommitInfo, GatewayError, GatewayResult, RemoteRef};
use crate::core::error::ResolverError;

/// Gateway state for a single git-backed source: just the local working directory, a
/// plain checkout (not bare, not a worktree pool) since the solver serializes all
/// operations against one source through a single gateway instance.
#[derive(Debug, Clone)]
pub struct GitGateway {
    working_dir: PathBuf,
}

impl GitGateway {
    /// Builds a gateway rooted at `working_dir`. Does not touch the filesystem.
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn cmd(&self, args: &[&str]) -> ProcessCommand {
        ProcessCommand::new("git").args(args.iter().map(|s| (*s).to_string())).current_dir(&self.working_dir)
    }

    async fn run_stdout(&self, args: &[&str], cancel: &CancellationToken) -> GatewayResult<String> {
        Ok(self.cmd(args).run_stdout(cancel).await?)
    }

    pub async fn get(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        if let Some(parent) = self.working_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GatewayError::Resolver(ResolverError::Io { path: parent.display().to_string(), source: e }))?;
        }
        ProcessCommand::new("git")
            .args(["clone", "--origin", "origin", remote_url, &self.working_dir.display().to_string()])
            .run_stdout(cancel)
            .await?;
        Ok(())
    }

    pub async fn fetch(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.run_stdout(&["fetch", "--all", "--tags", "--prune"], cancel).await?;
        Ok(())
    }

    pub async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        match self.cmd(&["checkout", "--force", revision_spec]).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => {}
            super::process::ProcessOutcome::Cancelled => return Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(e) => {
                return Err(GatewayError::Resolver(super::classify_checkout_failure(
                    &self.working_dir.display().to_string(),
                    revision_spec,
                    &e,
                )));
            }
        }
        self.submodule_sync_and_clean(cancel).await
    }

    /// "Defensive submodule sync + aggressive clean" run after every checkout,
    /// to purge state a differing submodule configuration between revisions can leave
    /// behind. Best-effort: a repository with no submodules still runs `clean` safely.
    pub async fn submodule_sync_and_clean(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        let _ = self.cmd(&["submodule", "sync", "--recursive"]).run(cancel).await;
        let _ = self.cmd(&["submodule", "update", "--init", "--recursive", "--force"]).run(cancel).await;
        self.run_stdout(&["clean", "-ffdx"], cancel).await?;
        Ok(())
    }

    #[must_use]
    pub fn check_local(&self) -> bool {
        self.working_dir.join(".git").exists()
    }

    pub async fn ping(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match ProcessCommand::new("git").args(["ls-remote", "--exit-code", remote_url, "HEAD"]).timeout(Some(std::time::Duration::from_secs(30))).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn commit_info(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<CommitInfo> {
        let format = "%H%x1f%an <%ae>%x1f%at%x1f%s";
        let out = self.run_stdout(&["show", "-s", &format!("--format={format}"), revision], cancel).await.map_err(|_| {
            GatewayError::Resolver(ResolverError::RevisionNotFound {
                source: self.working_dir.display().to_string(),
                revision: revision.to_string(),
            })
        })?;
        let mut parts = out.splitn(4, '\u{1f}');
        let rev = parts.next().unwrap_or_default().to_string();
        let author = parts.next().unwrap_or_default().to_string();
        let timestamp: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
        let summary = parts.next().unwrap_or_default().to_string();
        let date = Utc.timestamp_opt(timestamp, 0).single().unwrap_or_else(Utc::now);
        Ok(CommitInfo { revision: rev, author, date, summary })
    }

    /// Lists tags and branches via `git ls-remote`, applying git-specific rules:
    /// the first returned ref is HEAD (used to infer the default branch, breaking ties
    /// in favor of `master`), and `^{}`-suffixed dereferenced-annotated-tag refs
    /// supersede their non-dereferenced counterpart at the same tag name.
    ///
    /// Targets `remote_url` directly rather than a local `origin` remote, so this works
    /// before any clone exists — the same no-clone-required listing the real git command
    /// supports.
    pub async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<Vec<RemoteRef>> {
        let out = ProcessCommand::new("git").args(["ls-remote", "--tags", "--heads", remote_url]).run_stdout(cancel).await?;

        let mut head_revision: Option<String> = None;
        let mut branch_revisions: Vec<(String, String)> = Vec::new();
        let mut tag_revisions: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();

        for (idx, line) in out.lines().enumerate() {
            let Some((sha, ref_name)) = line.split_once('\t') else { continue };
            if idx == 0 {
                head_revision = Some(sha.to_string());
            }
            if let Some(branch) = ref_name.strip_prefix("refs/heads/") {
                branch_revisions.push((branch.to_string(), sha.to_string()));
            } else if let Some(tag) = ref_name.strip_prefix("refs/tags/") {
                if let Some(base) = tag.strip_suffix("^{}") {
                    tag_revisions.insert(base.to_string(), sha.to_string());
                } else {
                    tag_revisions.entry(tag.to_string()).or_insert_with(|| sha.to_string());
                }
            }
        }

        let tied_defaults: Vec<&str> = branch_revisions
            .iter()
            .filter(|(_, sha)| Some(sha.as_str()) == head_revision.as_deref())
            .map(|(name, _)| name.as_str())
            .collect();
        let default_branch = if tied_defaults.contains(&"master") {
            Some("master".to_string())
        } else if tied_defaults.len() == 1 {
            Some(tied_defaults[0].to_string())
        } else {
            None
        };

        let mut refs = Vec::new();
        for (name, revision) in branch_revisions {
            let is_default = match &default_branch {
                Some(d) => &name == d,
                None => tied_defaults.contains(&name.as_str()),
            };
            refs.push(RemoteRef { name, revision, is_branch: true, is_default });
        }
        for (name, revision) in tag_revisions {
            refs.push(RemoteRef { name, revision, is_branch: false, is_default: false });
        }
        Ok(refs)
    }

    pub async fn tags_from_commit(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<Vec<String>> {
        let out = self.run_stdout(&["tag", "--contains", revision], cancel).await?;
        Ok(out.lines().filter(|l| !l.is_empty()).map(String::from).collect())
    }

    pub async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match self.cmd(&["rev-parse", "--verify", "--quiet", &format!("{spec}^{{commit}}")]).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn is_dirty(&self, cancel: &CancellationToken) -> GatewayResult<bool> {
        let out = self.run_stdout(&["status", "--porcelain"], cancel).await?;
        Ok(!out.trim().is_empty())
    }

    pub async fn date(&self, cancel: &CancellationToken) -> GatewayResult<DateTime<Utc>> {
        let out = self.run_stdout(&["show", "-s", "--format=%at", "HEAD"], cancel).await?;
        let timestamp: i64 = out.trim().parse().unwrap_or(0);
        Ok(Utc.timestamp_opt(timestamp, 0).single().unwrap_or_else(Utc::now))
    }

    pub async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> GatewayResult<()> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| GatewayError::Resolver(ResolverError::Io { path: target_dir.display().to_string(), source: e }))?;
        self.run_stdout(&["checkout-index", "--all", "--force", &format!("--prefix={}/", target_dir.display())], cancel)
            .await?;
        Ok(())
    }

    pub async fn init(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|e| GatewayError::Resolver(ResolverError::Io { path: self.working_dir.display().to_string(), source: e }))?;
        self.run_stdout(&["init"], cancel).await?;
        Ok(())
    }
}
