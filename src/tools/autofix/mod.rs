//! Regex-driven code fixer: scan sources, propose and validate line rewrites,
//! apply them (optionally on a fresh branch) and leave PR templates and
//! regression tests behind.

pub mod fixer;
pub mod git;
pub mod pr;
pub mod rules;
pub mod scanner;
pub mod testgen;
pub mod validator;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::AutoFixSection;
use crate::errors::ToolError;
use crate::tools::git::GitRepo;
use fixer::{Fix, apply_fix, propose_fix};
use scanner::Issue;
use validator::{ValidationSummary, Validator};

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixPlan {
    pub issues: Vec<Issue>,
    pub fixes: Vec<Fix>,
}

impl FixPlan {
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let fixes = issues.iter().filter_map(propose_fix).collect();
        Self { issues, fixes }
    }

    pub fn auto_fixes(&self) -> Vec<Fix> {
        self.fixes.iter().filter(|f| f.auto_apply).cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedFix {
    pub fix: Fix,
    pub validation: ValidationSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<Fix>,
    pub rejected: Vec<RejectedFix>,
    /// Fixes that collided with an earlier fix on the same line.
    pub skipped: Vec<Fix>,
    pub files: Vec<PathBuf>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub pull_request: Option<PathBuf>,
}

pub struct AutoFixer {
    root: PathBuf,
    settings: AutoFixSection,
    validator: Validator,
}

impl AutoFixer {
    pub fn new(root: &Path, settings: AutoFixSection) -> Self {
        let validator = Validator::new(settings.max_line_length);
        Self {
            root: root.to_path_buf(),
            settings,
            validator,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scan(&self, target: &Path) -> Result<FixPlan> {
        Ok(FixPlan::from_issues(scanner::scan_path(target)?))
    }

    /// Validate and write `fixes`. One fix per line; later fixes on the same line are skipped.
    pub fn apply(&self, fixes: &[Fix]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        let mut by_file: BTreeMap<&Path, Vec<&Fix>> = BTreeMap::new();
        for fix in fixes {
            by_file.entry(fix.file.as_path()).or_default().push(fix);
        }

        for (file, file_fixes) in by_file {
            let mut content =
                std::fs::read_to_string(file).map_err(|source| ToolError::ReadFailed {
                    path: file.to_path_buf(),
                    source,
                })?;
            let mut touched_lines = HashSet::new();
            let mut changed = false;

            for fix in file_fixes {
                if !touched_lines.insert(fix.line) {
                    report.skipped.push(fix.clone());
                    continue;
                }
                let validation = self.validator.validate(fix);
                if !validation.all_passed {
                    tracing::warn!(
                        issue = %fix.issue_id,
                        failed = validation.failed,
                        "Fix rejected by validation"
                    );
                    report.rejected.push(RejectedFix {
                        fix: fix.clone(),
                        validation,
                    });
                    continue;
                }
                content = apply_fix(&content, fix)?;
                changed = true;
                report.applied.push(fix.clone());
            }

            if changed {
                std::fs::write(file, &content).map_err(|source| ToolError::WriteFailed {
                    path: file.to_path_buf(),
                    source,
                })?;
                report.files.push(file.to_path_buf());
            }
        }

        tracing::info!(
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            skipped = report.skipped.len(),
            "Fixes applied"
        );
        Ok(report)
    }

    /// Apply on a new branch, commit the touched files and write a PR template when warranted.
    pub fn apply_on_branch(&self, fixes: &[Fix], now: DateTime<Utc>) -> Result<ApplyReport> {
        let Some(first) = fixes.first() else {
            return Ok(ApplyReport::default());
        };
        let repo = GitRepo::open(&self.root)?;
        let branch = git::branch_name(
            &self.settings.branch_prefix,
            first.category,
            &first.issue_id,
            now.date_naive(),
        );
        repo.create_branch(&branch)?;
        tracing::info!(branch = %branch, "Created fix branch");

        let mut report = self.apply(fixes)?;
        report.branch = Some(branch.clone());
        if report.applied.is_empty() {
            return Ok(report);
        }

        report.commit = repo.commit_paths(&report.files, &git::commit_message(&report.applied))?;

        if pr::should_generate_pr(&report.applied) {
            let info = pr::PullRequestInfo::new(&report.applied, &branch, repo.workdir(), now);
            let dir = self.resolve(&self.settings.pr_dir);
            let (md, _) = pr::write_pr(&dir, &info)?;
            report.pull_request = Some(md);
        }
        Ok(report)
    }

    pub fn generate_tests(
        &self,
        issues: &[Issue],
        output_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Result<Vec<testgen::TestSuite>> {
        let out = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.resolve(&self.settings.test_output_dir));
        testgen::generate_tests(issues, &self.root, &out, now)
    }

    pub fn history(&self, file: &Path, now: DateTime<Utc>) -> Result<git::HistoryAnalysis> {
        let repo = GitRepo::open(&self.root)?;
        git::analyze_history(&repo, file, self.settings.history_months, now)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
