//! The Subversion gateway.
//!
//! Subversion is single-headed: there is no branch/tag distinction at the protocol
//! level, only directory conventions (`trunk`, `tags/*`, `branches/*`) that this gateway
//! does not interpret. `list_refs` reports a single
//! default entry for `HEAD`, resolved to its numeric revision via `svn info`; Subversion
//! sources never expose alternate named versions to the solver.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::process::ProcessCommand;
use super::{CommitInfo, GatewayError, GatewayResult, RemoteRef};
use crate::core::error::ResolverError;

#[derive(Debug, Clone)]
pub struct SvnGateway {
    working_dir: PathBuf,
}

impl SvnGateway {
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn cmd(&self, args: &[&str]) -> ProcessCommand {
        ProcessCommand::new("svn").args(args.iter().map(|s| (*s).to_string())).current_dir(&self.working_dir)
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
        ProcessCommand::new("svn").args(["checkout", remote_url, &self.working_dir.display().to_string()]).run_stdout(cancel).await?;
        Ok(())
    }

    pub async fn fetch(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        self.run_stdout(&["update"], cancel).await?;
        Ok(())
    }

    pub async fn update_version(&self, revision_spec: &str, cancel: &CancellationToken) -> GatewayResult<()> {
        match self.cmd(&["update", "--revision", revision_spec]).run(cancel).await {
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
        self.working_dir.join(".svn").exists()
    }

    pub async fn ping(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        match ProcessCommand::new("svn").args(["info", remote_url]).timeout(Some(std::time::Duration::from_secs(30))).run(cancel).await {
            super::process::ProcessOutcome::Ok(_) => Ok(true),
            super::process::ProcessOutcome::Cancelled => Err(GatewayError::Cancelled),
            super::process::ProcessOutcome::Err(_) => Ok(false),
        }
    }

    pub async fn commit_info(&self, revision: &str, cancel: &CancellationToken) -> GatewayResult<CommitInfo> {
        let rev_arg = format!("-r{revision}");
        let out = self.run_stdout(&["log", &rev_arg, "--limit", "1", "--xml"], cancel).await.map_err(|_| {
            GatewayError::Resolver(ResolverError::RevisionNotFound {
                source: self.working_dir.display().to_string(),
                revision: revision.to_string(),
            })
        })?;
        let author = extract_xml_tag(&out, "author").unwrap_or_default();
        let date_str = extract_xml_tag(&out, "date").unwrap_or_default();
        let summary = extract_xml_tag(&out, "msg").unwrap_or_default().lines().next().unwrap_or_default().to_string();
        let date = DateTime::parse_from_rfc3339(&date_str).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now());
        Ok(CommitInfo { revision: revision.to_string(), author, date, summary })
    }

    /// Reports a single synthetic default ref for `HEAD`, resolved to its numeric
    /// revision. Subversion has no tag/branch concept the gateway can enumerate.
    ///
    /// Unlike the other non-git gateways, `svn info` accepts a bare URL directly, so this
    /// never needs a local checkout just to list versions.
    pub async fn list_refs(&self, remote_url: &str, cancel: &CancellationToken) -> GatewayResult<Vec<RemoteRef>> {
        let out = if self.check_local() {
            self.run_stdout(&["info", "--show-item", "revision", "--revision", "HEAD"], cancel).await?
        } else {
            ProcessCommand::new("svn").args(["info", "--show-item", "revision", "--revision", "HEAD", remote_url]).run_stdout(cancel).await?
        };
        let revision = out.trim().to_string();
        Ok(vec![RemoteRef { name: "HEAD".to_string(), revision, is_branch: true, is_default: true }])
    }

    pub async fn tags_from_commit(&self, _revision: &str, _cancel: &CancellationToken) -> GatewayResult<Vec<String>> {
        Ok(Vec::new())
    }

    pub async fn is_reference(&self, spec: &str, cancel: &CancellationToken) -> GatewayResult<bool> {
        if spec.eq_ignore_ascii_case("head") || spec.eq_ignore_ascii_case("base") {
            return Ok(true);
        }
        if spec.parse::<u64>().is_err() {
            return Ok(false);
        }
        let rev_arg = format!("-r{spec}");
        match self.cmd(&["info", &rev_arg]).run(cancel).await {
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
        let out = self.run_stdout(&["info", "--show-item", "last-changed-date"], cancel).await?;
        Ok(DateTime::parse_from_rfc3339(out.trim()).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()))
    }

    pub async fn export_dir(&self, target_dir: &Path, cancel: &CancellationToken) -> GatewayResult<()> {
        self.cmd(&["export", "--force", ".", &target_dir.display().to_string()]).run_stdout(cancel).await?;
        Ok(())
    }

    pub async fn init(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|e| GatewayError::Resolver(ResolverError::Io { path: self.working_dir.display().to_string(), source: e }))?;
        // `svnadmin create` plus a local `file://` checkout is performed by the caller
        // (test fixtures); the gateway itself has nothing analogous to `git init`.
        let _ = cancel;
        Ok(())
    }
}

fn extract_xml_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].to_string())
}
