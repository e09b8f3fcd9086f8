//! Branch naming, commit messages and per-file history for fix runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Months, NaiveDate, Utc};
use git2::{DiffOptions, Sort};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use super::fixer::Fix;
use super::rules::{Category, Severity};
use crate::tools::git::GitRepo;

pub fn branch_name(prefix: &str, fix_type: Category, issue_id: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/{}-{}",
        prefix.trim_end_matches('/'),
        fix_type,
        issue_id,
        date.format("%Y%m%d")
    )
}

/// Categories in order of first appearance.
pub fn fix_types(fixes: &[Fix]) -> Vec<Category> {
    let mut seen = Vec::new();
    for fix in fixes {
        if !seen.contains(&fix.category) {
            seen.push(fix.category);
        }
    }
    seen
}

pub fn files_touched(fixes: &[Fix]) -> BTreeSet<&Path> {
    fixes.iter().map(|f| f.file.as_path()).collect()
}

fn join_types(types: &[Category]) -> String {
    types
        .iter()
        .map(Category::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn commit_message(fixes: &[Fix]) -> String {
    let mut message = format!("fix: Auto-fix {} issues", fixes.len());
    let types = fix_types(fixes);
    if !types.is_empty() {
        message.push_str(&format!(" ({})", join_types(&types)));
    }
    let files = files_touched(fixes).len();
    if files > 0 {
        message.push_str(&format!(
            " in {} file{}",
            files,
            if files > 1 { "s" } else { "" }
        ));
    }
    let critical: Vec<String> = fixes
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .map(|f| format!("- {}", f.description))
        .collect();
    if !critical.is_empty() {
        message.push_str("\n\nCritical fixes:\n");
        message.push_str(&critical.join("\n"));
    }
    message
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryAnalysis {
    pub commit_count: usize,
    pub last_commit: Option<String>,
    pub branch: String,
    pub contributors: Vec<String>,
    /// Commits per month within the window.
    pub change_frequency: f64,
}

/// Commits touching `path` (relative to the workdir), walking back from HEAD.
pub fn analyze_history(
    repo: &GitRepo,
    path: &Path,
    months: u32,
    now: DateTime<Utc>,
) -> Result<HistoryAnalysis> {
    let git = repo.repository();
    let relative = path.strip_prefix(repo.workdir()).unwrap_or(path);
    let since = now
        .checked_sub_months(Months::new(months))
        .unwrap_or(now)
        .timestamp();

    let mut walk = git.revwalk()?;
    walk.push_head().context("Repository has no commits")?;
    walk.set_sorting(Sort::TOPOLOGICAL)?;

    let mut commit_count = 0;
    let mut recent = 0;
    let mut last_commit = None;
    let mut contributors = BTreeSet::new();

    for oid in walk {
        let commit = git.find_commit(oid?)?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let mut opts = DiffOptions::new();
        opts.pathspec(relative);
        let diff = git.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        if diff.deltas().count() == 0 {
            continue;
        }

        commit_count += 1;
        if last_commit.is_none() {
            last_commit = Some(commit.id().to_string());
        }
        if let Some(name) = commit.author().name() {
            contributors.insert(name.to_string());
        }
        if commit.time().seconds() > since {
            recent += 1;
        }
    }

    let change_frequency = if months == 0 {
        0.0
    } else {
        recent as f64 / f64::from(months)
    };
    tracing::debug!(path = %relative.display(), commits = commit_count, "Analyzed history");

    Ok(HistoryAnalysis {
        commit_count,
        last_commit,
        branch: repo
            .current_branch()
            .unwrap_or_else(|| "unknown".to_string()),
        contributors: contributors.into_iter().collect(),
        change_frequency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::autofix::fixer::Risk;
    use crate::tools::git::tests::init_repo;
    use chrono::TimeZone;
    use std::fs;
    use std::path::PathBuf;

    fn fix(file: &str, category: Category, severity: Severity, description: &'static str) -> Fix {
        Fix {
            issue_id: "id".to_string(),
            rule_id: "rule",
            category,
            severity,
            file: PathBuf::from(file),
            line: 1,
            description,
            before: "a".to_string(),
            after: "b".to_string(),
            confidence: 90,
            risk: Risk::from(severity),
            auto_apply: true,
        }
    }

    #[test]
    fn test_branch_name() {
        let date = NaiveDate::from_ymd_opt(2026, 4, 7).unwrap();
        assert_eq!(
            branch_name("auto-fix", Category::Security, "inner-html-1a2b3c4d", date),
            "auto-fix/security/inner-html-1a2b3c4d-20260407"
        );
    }

    #[test]
    fn test_commit_message() {
        let fixes = vec![
            fix("a.ts", Category::Quality, Severity::Low, "var declaration"),
            fix("a.ts", Category::Security, Severity::Critical, "eval() executes arbitrary code"),
            fix("b.ts", Category::Quality, Severity::Low, "var declaration"),
        ];
        assert_eq!(
            commit_message(&fixes),
            "fix: Auto-fix 3 issues (quality, security) in 2 files\n\nCritical fixes:\n- eval() executes arbitrary code"
        );
        assert_eq!(
            commit_message(&fixes[..1]),
            "fix: Auto-fix 1 issues (quality) in 1 file"
        );
    }

    #[test]
    fn test_history_analysis() {
        let dir = init_repo();
        let repo = GitRepo::open(dir.path()).unwrap();

        fs::write(dir.path().join("beds.ts"), "export const a = 1;\n").unwrap();
        repo.commit_all("add beds").unwrap();
        fs::write(dir.path().join("other.ts"), "export const b = 1;\n").unwrap();
        repo.commit_all("add other").unwrap();
        fs::write(dir.path().join("beds.ts"), "export const a = 2;\n").unwrap();
        let head = repo.commit_all("update beds").unwrap().unwrap();

        let analysis = analyze_history(&repo, Path::new("beds.ts"), 6, Utc::now()).unwrap();
        assert_eq!(analysis.commit_count, 2);
        assert_eq!(analysis.last_commit.as_deref(), Some(head.as_str()));
        assert_eq!(analysis.contributors, vec!["test".to_string()]);
        assert!((analysis.change_frequency - 2.0 / 6.0).abs() < 1e-9);

        // Outside the window nothing counts towards the frequency
        let later = Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap();
        let analysis = analyze_history(&repo, Path::new("beds.ts"), 6, later).unwrap();
        assert_eq!(analysis.commit_count, 2);
        assert_eq!(analysis.change_frequency, 0.0);
    }
}
