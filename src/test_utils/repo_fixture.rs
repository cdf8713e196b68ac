//! Builds throwaway local git repositories for the integration suite: a temp directory
//! with Go-style package files, committed and tagged via [`TestGit`], addressable by a
//! `file://` URL the source manager can clone exactly as it would clone a real remote.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use super::git_helper::TestGit;

/// A disposable git repository rooted in a [`TempDir`], pre-initialized with a test git
/// identity so `commit` never fails for lack of `user.name`/`user.email`.
pub struct RepoFixture {
    dir: TempDir,
    git: TestGit,
}

impl RepoFixture {
    /// Creates a fresh, empty, `git init`-ed repository.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let git = TestGit::new(dir.path());
        git.init()?;
        git.config_user()?;
        Ok(Self { dir, git })
    }

    /// The repository's filesystem root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A `file://` URL the source manager's git gateway can clone from directly.
    #[must_use]
    pub fn file_url(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }

    /// Writes `contents` to `relative` (creating parent directories as needed).
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Writes a single-file Go-style package at `relative_dir`, declaring `package_name`
    /// and importing each of `imports`.
    pub fn write_go_package(&self, relative_dir: &str, package_name: &str, imports: &[&str]) -> Result<()> {
        let import_block = if imports.is_empty() {
            String::new()
        } else {
            let lines: Vec<String> = imports.iter().map(|i| format!("\t\"{i}\"")).collect();
            format!("\nimport (\n{}\n)\n", lines.join("\n"))
        };
        let contents = format!("package {package_name}\n{import_block}");
        self.write_file(&format!("{relative_dir}/main.go"), &contents)
    }

    /// Stages and commits every file currently in the working tree.
    pub fn commit(&self, message: &str) -> Result<()> {
        self.git.add_all()?;
        self.git.commit(message)?;
        Ok(())
    }

    /// Commits the working tree and tags the resulting commit.
    pub fn commit_and_tag(&self, message: &str, tag: &str) -> Result<()> {
        self.commit(message)?;
        self.git.tag(tag)?;
        Ok(())
    }

    /// Renames the current branch, so
    /// fixtures don't depend on the host's `init.defaultBranch` setting.
    pub fn ensure_branch(&self, name: &str) -> Result<()> {
        self.git.ensure_branch(name)
    }

    /// Creates a new branch off the current commit and switches to it.
    pub fn checkout_new_branch(&self, name: &str) -> Result<()> {
        self.git.checkout_new_branch(name)
    }

    /// Resolves `refname` (a tag, branch, or other revspec) to its full commit hash.
    pub fn rev_parse(&self, refname: &str) -> Result<String> {
        self.git.rev_parse(refname)
    }
}
