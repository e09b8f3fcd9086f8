//! Pull request access for the reviewer.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ToolError;

const GITHUB_API: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// `owner/name` repository slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl std::str::FromStr for RepoSlug {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => anyhow::bail!("Invalid repository '{}', expected owner/name", s),
        }
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A file touched by the pull request (subset of fields).
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Deserialize)]
struct PullRequest {
    head: PullHead,
}

#[derive(Deserialize)]
struct PullHead {
    sha: String,
}

#[derive(Deserialize)]
struct Tree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

/// Where the reviewed code lives and where the verdict goes.
#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn head_sha(&self) -> Result<String, ToolError>;
    async fn changed_files(&self) -> Result<Vec<ChangedFile>, ToolError>;
    /// Blob paths of the tree at `sha`. Failures yield an empty list.
    async fn tree_paths(&self, sha: &str) -> Vec<String>;
    /// File contents at `sha`; `None` when missing, binary or over `max_bytes`.
    async fn file_text(&self, path: &str, sha: &str, max_bytes: u64) -> Option<String>;
    /// Create the marked comment, or replace the body of an existing one.
    async fn upsert_comment(&self, marker: &str, body: &str) -> Result<(), ToolError>;
}

pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    repo: RepoSlug,
    pr_number: u64,
    api_base: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, repo: RepoSlug, pr_number: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            repo,
            pr_number,
            api_base: GITHUB_API.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_base, self.repo, path)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::GET, url)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.authorized(method, url)
            .header("Accept", "application/vnd.github+json")
    }

    fn authorized(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "tuinbeheer-security-review")
    }

    async fn fetch_head_sha(&self) -> anyhow::Result<String> {
        let pr: PullRequest = self
            .get(&self.url(&format!("/pulls/{}", self.pr_number)))
            .send()
            .await
            .context("Failed to send pull request lookup to GitHub")?
            .error_for_status()
            .context("GitHub pulls API returned error status")?
            .json()
            .await
            .context("Failed to parse pull request from GitHub")?;
        Ok(pr.head.sha)
    }

    async fn fetch_changed_files(&self) -> anyhow::Result<Vec<ChangedFile>> {
        let url = self.url(&format!("/pulls/{}/files", self.pr_number));
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<ChangedFile> = self
                .get(&url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await
                .context("Failed to send changed files request to GitHub")?
                .error_for_status()
                .context("GitHub files API returned error status")?
                .json()
                .await
                .context("Failed to parse changed files from GitHub")?;
            let count = batch.len();
            files.extend(batch);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn fetch_tree(&self, sha: &str) -> anyhow::Result<Vec<String>> {
        let tree: Tree = self
            .get(&self.url(&format!("/git/trees/{}", sha)))
            .query(&[("recursive", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| e.path)
            .collect())
    }

    async fn fetch_file(&self, path: &str, sha: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let resp = self
            .authorized(reqwest::Method::GET, &self.url(&format!("/contents/{}", path)))
            .header("Accept", "application/vnd.github.raw")
            .query(&[("ref", sha)])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    async fn find_marked_comment(&self, marker: &str) -> anyhow::Result<Option<u64>> {
        let url = self.url(&format!("/issues/{}/comments", self.pr_number));
        let mut page = 1u32;
        loop {
            let batch: Vec<IssueComment> = self
                .get(&url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await
                .context("Failed to list pull request comments")?
                .error_for_status()
                .context("GitHub comments API returned error status")?
                .json()
                .await
                .context("Failed to parse pull request comments")?;
            let count = batch.len();
            if let Some(found) = batch
                .into_iter()
                .find(|c| c.body.as_deref().is_some_and(|b| b.contains(marker)))
            {
                return Ok(Some(found.id));
            }
            if count < PER_PAGE {
                return Ok(None);
            }
            page += 1;
        }
    }

    async fn write_comment(&self, marker: &str, body: &str) -> anyhow::Result<()> {
        let payload = json!({ "body": body });
        match self.find_marked_comment(marker).await? {
            Some(id) => {
                self.request(reqwest::Method::PATCH, &self.url(&format!("/issues/comments/{}", id)))
                    .json(&payload)
                    .send()
                    .await
                    .context("Failed to update review comment")?
                    .error_for_status()
                    .context("GitHub rejected the comment update")?;
                tracing::info!(comment_id = id, "Updated security review comment");
            }
            None => {
                self.request(
                    reqwest::Method::POST,
                    &self.url(&format!("/issues/{}/comments", self.pr_number)),
                )
                .json(&payload)
                .send()
                .await
                .context("Failed to post review comment")?
                .error_for_status()
                .context("GitHub rejected the review comment")?;
                tracing::info!(pr = self.pr_number, "Posted security review comment");
            }
        }
        Ok(())
    }
}

fn github_error(e: anyhow::Error) -> ToolError {
    ToolError::GitHub(format!("{:#}", e))
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn head_sha(&self) -> Result<String, ToolError> {
        self.fetch_head_sha().await.map_err(github_error)
    }

    async fn changed_files(&self) -> Result<Vec<ChangedFile>, ToolError> {
        let files = self.fetch_changed_files().await.map_err(github_error)?;
        tracing::info!(count = files.len(), "Fetched changed files");
        Ok(files)
    }

    async fn tree_paths(&self, sha: &str) -> Vec<String> {
        self.fetch_tree(sha).await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Could not list repository tree");
            Vec::new()
        })
    }

    async fn file_text(&self, path: &str, sha: &str, max_bytes: u64) -> Option<String> {
        match self.fetch_file(path, sha).await {
            Ok(Some(bytes)) if bytes.len() as u64 <= max_bytes => String::from_utf8(bytes).ok(),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(path, error = %e, "Could not fetch file contents");
                None
            }
        }
    }

    async fn upsert_comment(&self, marker: &str, body: &str) -> Result<(), ToolError> {
        self.write_comment(marker, body).await.map_err(github_error)
    }
}
