//! AI security review of a pull request.
//!
//! Builds a digest of the repository's own standards, sends the changed
//! files to the chat model in chunks, prefixes a summary computed from the
//! findings and posts the result as a single sticky PR comment.

pub mod github;
pub mod openai;
pub mod prompt;
pub mod report;

use std::path::PathBuf;

use crate::config::TuinConfig;
use crate::errors::ToolError;
pub use github::{ChangedFile, CodeHost, GitHubClient, RepoSlug};
pub use openai::{ChatMessage, ChatModel, OpenAiClient};
use prompt::ReviewTarget;
pub use report::{ReportValidation, SeverityCounts};

const TEMPERATURE: f32 = 0.1;

/// Credentials and target pull request, read from the CI environment.
#[derive(Debug, Clone)]
pub struct ReviewEnv {
    pub github_token: String,
    pub openai_api_key: String,
    pub pr_number: u64,
    pub repo: RepoSlug,
}

impl ReviewEnv {
    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ToolError> {
        let required = |name: &'static str| {
            get(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ToolError::MissingEnv { name })
        };
        let github_token = required("GITHUB_TOKEN")?;
        let openai_api_key = required("OPENAI_API_KEY")?;
        let pr_number = required("PR_NUMBER")?
            .trim()
            .parse::<u64>()
            .map_err(|_| ToolError::Other(anyhow::anyhow!("PR_NUMBER must be a number")))?;
        let repo: RepoSlug = required("REPO")?.parse()?;
        Ok(Self {
            github_token,
            openai_api_key,
            pr_number,
            repo,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub model: String,
    pub max_file_bytes: u64,
    pub max_input_chars: usize,
    pub fail_on_high: bool,
    pub report_file: PathBuf,
}

impl ReviewSettings {
    pub fn from_config(config: &TuinConfig) -> Self {
        let review = &config.toml.review;
        Self {
            model: review.model.clone(),
            max_file_bytes: review.max_file_bytes,
            max_input_chars: review.max_input_chars.max(1),
            fail_on_high: review.fail_on_high,
            report_file: config.resolve(&review.report_file),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub report: String,
    pub counts: SeverityCounts,
    pub files_reviewed: usize,
    pub blocking: bool,
    /// `None` when nothing was sent to the model
    pub validation: Option<ReportValidation>,
}

impl ReviewOutcome {
    pub fn should_fail(&self, fail_on_high: bool) -> bool {
        fail_on_high && self.blocking
    }
}

pub struct SecurityReviewer<'a> {
    host: &'a dyn CodeHost,
    model: &'a dyn ChatModel,
    settings: ReviewSettings,
}

impl<'a> SecurityReviewer<'a> {
    pub fn new(host: &'a dyn CodeHost, model: &'a dyn ChatModel, settings: ReviewSettings) -> Self {
        Self {
            host,
            model,
            settings,
        }
    }

    /// Review, post the comment and write the report file. On failure a
    /// failure comment is posted and the error returned.
    pub async fn run(&self) -> Result<ReviewOutcome, ToolError> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        match self.review().await {
            Ok(outcome) => {
                self.host
                    .upsert_comment(
                        report::COMMENT_MARKER,
                        &report::comment_body(&outcome.report, &timestamp),
                    )
                    .await?;
                self.write_report(&outcome.report)?;
                tracing::info!(
                    critical = outcome.counts.critical,
                    high = outcome.counts.high,
                    files = outcome.files_reviewed,
                    "Security review completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Security review failed");
                let body = report::failure_body(&e.to_string());
                if let Err(post_err) = self
                    .host
                    .upsert_comment(report::COMMENT_MARKER, &report::comment_body(&body, &timestamp))
                    .await
                {
                    tracing::error!(error = %post_err, "Failed to post failure comment");
                }
                if let Err(write_err) = self.write_report(&body) {
                    tracing::error!(error = %write_err, "Failed to write failure report");
                }
                Err(e)
            }
        }
    }

    fn write_report(&self, content: &str) -> Result<(), ToolError> {
        std::fs::write(&self.settings.report_file, content).map_err(|source| {
            ToolError::WriteFailed {
                path: self.settings.report_file.clone(),
                source,
            }
        })?;
        tracing::info!(path = %self.settings.report_file.display(), "Security review written");
        Ok(())
    }

    /// Produce the review without publishing it.
    pub async fn review(&self) -> Result<ReviewOutcome, ToolError> {
        let sha = self.host.head_sha().await?;
        let docs = self.collect_docs(&sha).await;
        tracing::info!(docs = docs.len(), "Collected project standards");
        let digest = self.standards_digest(&docs).await;

        let changed = self.host.changed_files().await?;
        let targets = self.review_targets(&changed, &sha).await;
        tracing::info!(files = targets.len(), "Reviewing files for security issues");

        if targets.is_empty() {
            return Ok(ReviewOutcome {
                report: report::no_targets_body(),
                counts: SeverityCounts::default(),
                files_reviewed: 0,
                blocking: false,
                validation: None,
            });
        }

        let batches =
            prompt::review_message_batches(&digest, &targets, self.settings.max_input_chars);
        let mut outputs = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            tracing::debug!(chunk = i + 1, total = batches.len(), "Sending review chunk");
            outputs.push(self.model.complete(batch, TEMPERATURE).await?);
        }
        let findings = outputs.join("\n\n---\n\n");

        let summary = report::summarize(&findings, targets.len());
        let mut complete = format!("{}\n{}", summary, findings);
        let validation = report::validate_report(&complete);
        if !validation.is_valid() {
            tracing::warn!(missing = ?validation.missing, "Review output is incomplete");
            complete.push_str(report::VALIDATION_NOTE);
        }

        Ok(ReviewOutcome {
            counts: SeverityCounts::from_report(&findings),
            blocking: report::has_blocking_findings(&complete),
            files_reviewed: targets.len(),
            validation: Some(validation),
            report: complete,
        })
    }

    async fn collect_docs(&self, sha: &str) -> Vec<(String, String)> {
        let tree = self.host.tree_paths(sha).await;
        let mut docs = Vec::new();
        for path in prompt::standards_doc_paths(&tree) {
            if let Some(text) = self
                .host
                .file_text(&path, sha, self.settings.max_file_bytes)
                .await
            {
                let capped =
                    prompt::cap_text(&text, self.settings.max_input_chars, "<!-- truncated -->");
                docs.push((path, capped));
            }
        }
        docs
    }

    async fn standards_digest(&self, docs: &[(String, String)]) -> String {
        if docs.is_empty() {
            return prompt::NO_STANDARDS.to_string();
        }
        match self
            .model
            .complete(&prompt::standards_messages(docs), TEMPERATURE)
            .await
        {
            Ok(digest) if !digest.trim().is_empty() => digest,
            Ok(_) => "Standards summary unavailable.".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to generate standards digest");
                "Standards summary unavailable due to API error. Review will proceed with general security best practices.".to_string()
            }
        }
    }

    async fn review_targets(&self, changed: &[ChangedFile], sha: &str) -> Vec<ReviewTarget> {
        let mut targets = Vec::new();
        for file in changed.iter().filter(|f| prompt::should_review(f)) {
            let content = self
                .host
                .file_text(&file.filename, sha, self.settings.max_file_bytes)
                .await
                .map(|text| {
                    prompt::cap_text(&text, self.settings.max_input_chars, "/* ...truncated... */")
                });
            let target = ReviewTarget {
                path: file.filename.clone(),
                patch: file.patch.clone(),
                content,
            };
            if !target.is_empty() {
                targets.push(target);
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeHost {
        files: Vec<ChangedFile>,
        contents: HashMap<String, String>,
        tree: Vec<String>,
        comments: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CodeHost for FakeHost {
        async fn head_sha(&self) -> Result<String, ToolError> {
            Ok("abc123".to_string())
        }

        async fn changed_files(&self) -> Result<Vec<ChangedFile>, ToolError> {
            Ok(self.files.clone())
        }

        async fn tree_paths(&self, _sha: &str) -> Vec<String> {
            self.tree.clone()
        }

        async fn file_text(&self, path: &str, _sha: &str, max_bytes: u64) -> Option<String> {
            self.contents
                .get(path)
                .filter(|c| c.len() as u64 <= max_bytes)
                .cloned()
        }

        async fn upsert_comment(&self, marker: &str, body: &str) -> Result<(), ToolError> {
            self.comments
                .lock()
                .unwrap()
                .push((marker.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct FakeModel {
        reply: Result<String, String>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl FakeModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, ToolError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.reply.clone().map_err(ToolError::Model)
        }
    }

    fn settings(dir: &std::path::Path) -> ReviewSettings {
        ReviewSettings {
            model: "gpt-4o-mini".to_string(),
            max_file_bytes: 200_000,
            max_input_chars: 32_000,
            fail_on_high: true,
            report_file: dir.join("ai-security-review.md"),
        }
    }

    fn changed(name: &str) -> ChangedFile {
        ChangedFile {
            filename: name.to_string(),
            status: "modified".to_string(),
            patch: Some("+ eval(input)".to_string()),
        }
    }

    const HIGH_FINDING: &str = "### ⚠️ High Priority Issues\n\n**File**: `src/a.ts`\n**Lines**: 1\n**Issue**: Use of eval\n```ts\neval(input)\n```\n```ts\nJSON.parse(input)\n```\n- [ ] **src/a.ts:1** - remove eval";

    #[test]
    fn test_env_requires_all_variables() {
        let env: HashMap<&str, &str> = [
            ("GITHUB_TOKEN", "ghp_x"),
            ("OPENAI_API_KEY", "sk-x"),
            ("PR_NUMBER", "12"),
            ("REPO", "acme/tuin"),
        ]
        .into_iter()
        .collect();
        let parsed = ReviewEnv::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(parsed.pr_number, 12);
        assert_eq!(parsed.repo.name, "tuin");

        let err = ReviewEnv::from_lookup(|k| {
            (k != "OPENAI_API_KEY")
                .then(|| env.get(k).map(|v| v.to_string()))
                .flatten()
        })
        .unwrap_err();
        assert!(matches!(err, ToolError::MissingEnv { name: "OPENAI_API_KEY" }));
    }

    #[tokio::test]
    async fn test_review_posts_marked_comment_and_writes_report() {
        let dir = tempdir().unwrap();
        let host = FakeHost {
            files: vec![changed("src/a.ts"), changed("logo.png")],
            contents: [("src/a.ts".to_string(), "eval(input);".to_string())]
                .into_iter()
                .collect(),
            ..FakeHost::default()
        };
        let model = FakeModel::replying(HIGH_FINDING);
        let reviewer = SecurityReviewer::new(&host, &model, settings(dir.path()));

        let outcome = reviewer.run().await.unwrap();
        assert_eq!(outcome.files_reviewed, 1);
        assert_eq!(outcome.counts.high, 1);
        assert!(outcome.blocking);
        assert!(outcome.should_fail(true));
        assert!(!outcome.should_fail(false));
        assert!(outcome.validation.as_ref().unwrap().is_valid());
        assert!(outcome.report.starts_with("## 🔒 Security Review Summary"));
        assert!(outcome.report.contains("**Most Critical**: Use of eval"));

        // No docs in the tree: only the review chunk goes to the model
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][1].content.contains("1: eval(input);"));
        assert!(calls[0][1].content.contains(prompt::NO_STANDARDS));

        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].0, report::COMMENT_MARKER);
        assert!(comments[0].1.starts_with(report::COMMENT_MARKER));

        let written = std::fs::read_to_string(dir.path().join("ai-security-review.md")).unwrap();
        assert_eq!(written, outcome.report);
    }

    #[tokio::test]
    async fn test_standards_digest_uses_docs() {
        let dir = tempdir().unwrap();
        let host = FakeHost {
            files: vec![changed("src/a.ts")],
            contents: [
                ("README.md".to_string(), "Never log secrets.".to_string()),
                ("src/a.ts".to_string(), "x".to_string()),
            ]
            .into_iter()
            .collect(),
            ..FakeHost::default()
        };
        let model = FakeModel::replying("No security issues detected in the analyzed files");
        let reviewer = SecurityReviewer::new(&host, &model, settings(dir.path()));
        let outcome = reviewer.review().await.unwrap();

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].content, prompt::STANDARDS_SYSTEM_PROMPT);
        assert!(calls[0][1].content.contains("FILE: README.md\nNever log secrets."));
        assert!(!outcome.blocking);
        assert_eq!(outcome.counts.total(), 0);
        assert!(outcome.report.contains(report::VALIDATION_NOTE.trim()));
    }

    #[tokio::test]
    async fn test_no_reviewable_files() {
        let dir = tempdir().unwrap();
        let host = FakeHost {
            files: vec![changed("package-lock.json"), changed("docs/logo.svg")],
            ..FakeHost::default()
        };
        let model = FakeModel::replying("unused");
        let reviewer = SecurityReviewer::new(&host, &model, settings(dir.path()));
        let outcome = reviewer.run().await.unwrap();
        assert_eq!(outcome.files_reviewed, 0);
        assert!(outcome.report.contains("No reviewable code changes detected"));
        assert!(model.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_posts_failure_comment() {
        let dir = tempdir().unwrap();
        let host = FakeHost {
            files: vec![changed("src/a.ts")],
            ..FakeHost::default()
        };
        let model = FakeModel::failing("rate limited");
        let reviewer = SecurityReviewer::new(&host, &model, settings(dir.path()));
        let err = reviewer.run().await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));

        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].1.contains("## 🚨 AI Security Review Failed"));
        let written = std::fs::read_to_string(dir.path().join("ai-security-review.md")).unwrap();
        assert!(written.contains("rate limited"));
    }
}
