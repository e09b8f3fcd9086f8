//! Thin git2 wrapper shared by the build monitor and the auto-fixer.

use anyhow::{Context, Result};
use git2::{BranchType, IndexAddOption, Repository, Signature, StatusOptions};
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct GitRepo {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepo {
    pub fn open(project_dir: &Path) -> Result<Self> {
        let repo = Repository::discover(project_dir).context("Failed to open git repository")?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dir.to_path_buf());
        Ok(Self { repo, workdir })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("tuinbeheer", "tuinbeheer@localhost")?),
        }
    }

    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    pub fn head_sha(&self) -> Option<String> {
        self.head_commit().map(|c| c.id().to_string())
    }

    /// Whether the working tree has changes, untracked files included.
    pub fn is_dirty(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    /// Stage everything and commit. Returns `None` when there was nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<Option<String>> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        self.commit_index(index, message)
    }

    /// Stage the given paths (relative to the workdir) and commit.
    pub fn commit_paths(&self, paths: &[PathBuf], message: &str) -> Result<Option<String>> {
        let mut index = self.repo.index()?;
        for path in paths {
            let relative = path.strip_prefix(&self.workdir).unwrap_or(path);
            index
                .add_path(relative)
                .with_context(|| format!("Failed to stage {}", relative.display()))?;
        }
        index.write()?;
        self.commit_index(index, message)
    }

    fn commit_index(&self, mut index: git2::Index, message: &str) -> Result<Option<String>> {
        let tree_id = index.write_tree()?;
        let parent = self.head_commit();
        if let Some(parent) = &parent
            && parent.tree_id() == tree_id
        {
            return Ok(None);
        }
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        tracing::info!(commit = %oid, "Committed changes");
        Ok(Some(oid.to_string()))
    }

    /// Create `name` at HEAD and check it out.
    pub fn create_branch(&self, name: &str) -> Result<()> {
        let head = self
            .head_commit()
            .context("Cannot branch from a repository without commits")?;
        if self.repo.find_branch(name, BranchType::Local).is_err() {
            self.repo.branch(name, &head, false)?;
        }
        let refname = format!("refs/heads/{}", name);
        self.repo.set_head(&refname)?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().safe()))?;
        Ok(())
    }

    pub fn current_branch(&self) -> Option<String> {
        self.repo
            .head()
            .ok()
            .and_then(|h| h.shorthand().map(str::to_string))
    }
}

/// Push the current branch of the repository at `workdir` with the git CLI,
/// which picks up the user's credentials.
pub async fn push(workdir: &Path) -> Result<()> {
    let output = Command::new("git")
        .arg("push")
        .current_dir(workdir)
        .output()
        .await
        .context("Failed to run git push")?;
    if !output.status.success() {
        anyhow::bail!(
            "git push failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
