//! The Bazaar gateway.
//!
//! Bazaar has no branch concept at the gateway level: each working directory is itself a
//! branch, and the only names available are tags and the synthetic `(default)` pointer at
//! the branch tip.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use super::process::ProcessCommand;
use super::{CommitInfo, GatewayError, GatewayResult, RemoteRef};
use crate::core::error::ResolverError;

#[derive(Debug, Clone)]
pub struct BzrGateway {
    working_dir: PathBuf,
}

impl BzrGateway {
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn cmd(&self, args: &[&str]) -> ProcessCommand {
        ProcessCommand::new("bzr").args(args.iter().map(|s| (*s).to_string())).current_dir(&self.working_dir)
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
        ProcessCommand::new("bzr").args(["branch", remote_url, &self.working_dir.display().to_string()]).run_stdout(cancel).await?;
        Ok(())
    }

    pub async fn fetch(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.run_stdout(&["pull", "--overwrite"], cancel).await?;
        Ok(())
    }

    pub async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        let rev_arg = format!("-r{revision_spec}");
        match self.cmd(&["update", &rev_arg]).run(cancel).await {
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
        self.working_dir.join(".bzr").exists()
    }

    pub async fn ping(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match ProcessCommand::new("bzr").args(["info", remote_url]).timeout(Some(std::time::Duration::from_secs(30))).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn commit_info(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<CommitInfo> {
        let rev_arg = format!("-r{revision}");
        let out = self.run_stdout(&["log", &rev_arg, "--line"], cancel).await.map_err(|_| {
            GatewayError::Resolver(ResolverError::RevisionNotFound {
                source: self.working_dir.display().to_string(),
                revision: revision.to_string(),
            })
        })?;
        // `bzr log --line` format: "<revno>: <author> <date> <summary>"
        let mut fields = out.splitn(2, ": ");
        let revno = fields.next().unwrap_or(revision).to_string();
        let rest = fields.next().unwrap_or_default();
        let mut rest_fields = rest.splitn(3, ' ');
        let author = rest_fields.next().unwrap_or_default().to_string();
        let date_str = rest_fields.next().unwrap_or_default();
        let summary = rest_fields.next().unwrap_or_default().to_string();
        let date = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .unwrap_or_else(Utc::now);
        Ok(CommitInfo { revision: revno, author, date, summary })
    }

    /// Lists tags plus the synthetic `(default)` pointer at the current tip.
    ///
    /// Bazaar has no remote-only listing; this clones `remote_url` first if the working
    /// directory isn't already a branch (and pulls otherwise) before listing.
    pub async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<Vec<RemoteRef>> {
        if self.check_local() {
            self.fetch(cancel).await?;
        } else {
            self.get(remote_url, cancel).await?;
        }

        let mut refs = Vec::new();

        let tip = self.run_stdout(&["revno"], cancel).await.unwrap_or_default();
        if !tip.trim().is_empty() {
            refs.push(RemoteRef { name: "(default)".to_string(), revision: tip.trim().to_string(), is_branch: true, is_default: true });
        }

        let tags_out = self.run_stdout(&["tags"], cancel).await?;
        for line in tags_out.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(revision)) = (parts.next(), parts.next()) else { continue };
            refs.push(RemoteRef { name: name.to_string(), revision: revision.to_string(), is_branch: false, is_default: false });
        }

        Ok(refs)
    }

    pub async fn tags_from_commit(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<Vec<String>> {
        let tags_out = self.run_stdout(&["tags", "--sort=time"], cancel).await?;
        let mut matching = Vec::new();
        for line in tags_out.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(rev)) = (parts.next(), parts.next()) else { continue };
            if rev == revision {
                matching.push(name.to_string());
            }
        }
        Ok(matching)
    }

    pub async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        let rev_arg = format!("-r{spec}");
        match self.cmd(&["log", &rev_arg, "--line"]).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn is_dirty(&self, cancel: &CancellationToken) -> GatewayResult<bool> {
        let out = self.run_stdout(&["status", "--short"], cancel).await?;
        Ok(!out.trim().is_empty())
    }

    pub async fn date(&self, cancel: &CancellationToken) -> GatewayResult<DateTime<Utc>> {
        let out = self.run_stdout(&["log", "-r-1", "--line"], cancel).await?;
        let date_str = out.split_whitespace().nth(2).unwrap_or_default();
        Ok(chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .unwrap_or_else(Utc::now))
    }

    pub async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> GatewayResult<()> {
        self.cmd(&["export", &target_dir.display().to_string()]).run_stdout(cancel).await?;
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
