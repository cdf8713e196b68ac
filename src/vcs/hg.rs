//! The Mercurial gateway.
//!
//! Mercurial has three naming concepts where git has one: branches (permanent, recorded
//! in each changeset), bookmarks (movable pointers, git-branch-like), and tags (recorded
//! in `.hgtags`). The bookmark named `@` is the default version whenever it exists
//! (active or not), falling back to the `default` branch otherwise; the synthetic
//! `tip` pointer is never listed as a selectable version.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use super::process::ProcessCommand;
use super::{CommitInfo, GatewayError, GatewayResult, RemoteRef};
use crate::core::error::ResolverError;

#[derive(Debug, Clone)]
pub struct HgGateway {
    working_dir: PathBuf,
}

impl HgGateway {
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn cmd(&self, args: &[&str]) -> ProcessCommand {
        ProcessCommand::new("hg").args(args.iter().map(|s| (*s).to_string())).current_dir(&self.working_dir)
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
        ProcessCommand::new("hg").args(["clone", remote_url, &self.working_dir.display().to_string()]).run_stdout(cancel).await?;
        Ok(())
    }

    pub async fn fetch(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        // `hg pull` exits with status 1 when there is nothing new; that is not a failure.
        let _ = self.cmd(&["pull"]).run(cancel).await;
        Ok(())
    }

    pub async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        match self.cmd(&["update", "--clean", "--rev", revision_spec]).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(()),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(e) => Err(GatewayError::Resolver(super::classify_checkout_failure(
                &self.working_dir.display().to_string(),
                revision_spec,
                &e,
            ))),
        }
    }

    #[must_use]
    pub fn check_local(&self) -> bool {
        self.working_dir.join(".hg").exists()
    }

    pub async fn ping(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match ProcessCommand::new("hg").args(["identify", remote_url]).timeout(Some(std::time::Duration::from_secs(30))).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn commit_info(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<CommitInfo> {
        let template = r#"{node}\x1f{author}\x1f{date|hgdate}\x1f{desc|firstline}"#;
        let out = self.run_stdout(&["log", "--rev", revision, "--template", template], cancel).await.map_err(|_| {
            GatewayError::Resolver(ResolverError::RevisionNotFound {
                source: self.working_dir.display().to_string(),
                revision: revision.to_string(),
            })
        })?;
        let mut parts = out.splitn(4, '\u{1f}');
        let rev = parts.next().unwrap_or_default().to_string();
        let author = parts.next().unwrap_or_default().to_string();
        let hgdate = parts.next().unwrap_or("0 0");
        let summary = parts.next().unwrap_or_default().to_string();
        let timestamp: i64 = hgdate.split_whitespace().next().unwrap_or("0").parse().unwrap_or(0);
        let date = Utc.timestamp_opt(timestamp, 0).single().unwrap_or_else(Utc::now);
        Ok(CommitInfo { revision: rev, author, date, summary })
    }

    /// Lists branches, bookmarks, and tags. `tip` is filtered out (it always
    /// exists and names nothing selectable). The bookmark named `@`, if present, is the
    /// default, regardless of whether it is currently active; otherwise the `default`
    /// branch is.
    ///
    /// Mercurial has no `git ls-remote` equivalent that works without a local clone, so
    /// this clones `remote_url` first if the working directory isn't one already (and
    /// pulls otherwise) before listing, unlike the git gateway's clone-free fast path.
    pub async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<Vec<RemoteRef>> {
        if self.check_local() {
            self.fetch(cancel).await?;
        } else {
            self.get(remote_url, cancel).await?;
        }

        let mut refs = Vec::new();

        let branches_out = self.run_stdout(&["branches", "--template", "{branch}\u{1f}{node}\n"], cancel).await?;
        let branch_names: Vec<(String, String)> = branches_out
            .lines()
            .filter_map(|l| l.split_once('\u{1f}').map(|(n, r)| (n.to_string(), r.to_string())))
            .collect();

        let bookmarks_out = self.run_stdout(&["bookmarks", "--template", "{bookmark}\u{1f}{node}\n"], cancel).await?;
        let mut has_at_bookmark = false;
        for line in bookmarks_out.lines() {
            let Some((name, revision)) = line.split_once('\u{1f}') else { continue };
            if name.is_empty() {
                continue;
            }
            let is_default = name == "@";
            if is_default {
                has_at_bookmark = true;
            }
            refs.push(RemoteRef { name: name.to_string(), revision: revision.to_string(), is_branch: true, is_default });
        }

        for (name, revision) in branch_names {
            let is_default = !has_at_bookmark && name == "default";
            refs.push(RemoteRef { name, revision, is_branch: true, is_default });
        }

        let tags_out = self.run_stdout(&["tags", "--template", "{tag}\u{1f}{node}\n"], cancel).await?;
        for line in tags_out.lines() {
            let Some((tag, revision)) = line.split_once('\u{1f}') else { continue };
            if tag == "tip" {
                continue;
            }
            refs.push(RemoteRef { name: tag.to_string(), revision: revision.to_string(), is_branch: false, is_default: false });
        }

        Ok(refs)
    }

    pub async fn tags_from_commit(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<Vec<String>> {
        let out = self.run_stdout(&["log", "--rev", &format!("{revision}::"), "--template", "{tags}\n"], cancel).await?;
        Ok(out.split_whitespace().filter(|t| *t != "tip").map(String::from).collect())
    }

    pub async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match self.cmd(&["log", "--rev", spec, "--limit", "1"]).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn is_dirty(&self, cancel: &CancellationToken) -> GatewayResult<bool> {
        let out = self.run_stdout(&["status"], cancel).await?;
        Ok(!out.trim().is_empty())
    }

    pub async fn date(&self, cancel: &CancellationToken) -> GatewayResult<DateTime<Utc>> {
        let out = self.run_stdout(&["log", "--rev", ".", "--template", "{date|hgdate}"], cancel).await?;
        let timestamp: i64 = out.split_whitespace().next().unwrap_or("0").parse().unwrap_or(0);
        Ok(Utc.timestamp_opt(timestamp, 0).single().unwrap_or_else(Utc::now))
    }

    pub async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> GatewayResult<()> {
        self.cmd(&["archive", &target_dir.display().to_string()]).run_stdout(cancel).await?;
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
