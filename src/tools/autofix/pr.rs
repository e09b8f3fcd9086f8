//! Pull request templates written next to the repository for review.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::fixer::Fix;
use super::git::{files_touched, fix_types};
use super::rules::{Category, Severity};
use crate::errors::ToolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub branch: String,
    pub fixes: usize,
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PullRequestInfo {
    pub fn new(fixes: &[Fix], branch: &str, root: &Path, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("auto-fix-{}", now.format("%Y%m%d%H%M%S")),
            title: pr_title(fixes),
            description: pr_description(fixes, branch, root, now),
            branch: branch.to_string(),
            fixes: fixes.len(),
            files: files_touched(fixes)
                .into_iter()
                .map(|f| display_path(f, root))
                .collect(),
            created_at: now,
        }
    }
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn critical_count(fixes: &[Fix]) -> usize {
    fixes
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count()
}

pub fn pr_title(fixes: &[Fix]) -> String {
    let mut title = format!("🔧 Auto-fix: {} issues", fixes.len());
    let critical = critical_count(fixes);
    if critical > 0 {
        title.push_str(&format!(" ({} critical)", critical));
    }
    let types = fix_types(fixes);
    if !types.is_empty() {
        let types: Vec<String> = types.iter().map(Category::to_string).collect();
        title.push_str(&format!(" - {}", types.join(", ")));
    }
    title
}

pub fn pr_description(fixes: &[Fix], branch: &str, root: &Path, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "## 🤖 Auto-generated Pull Request".to_string(),
        String::new(),
        "This PR was generated by `tuinbeheer auto-fix` to resolve code quality issues.".to_string(),
        String::new(),
        "### 📊 Summary".to_string(),
        format!("- **Total fixes:** {}", fixes.len()),
        format!("- **Files modified:** {}", files_touched(fixes).len()),
        format!("- **Branch:** `{}`", branch),
        format!("- **Generated:** {}", now.format("%Y-%m-%d %H:%M:%S UTC")),
        String::new(),
        "### 🔍 Fix Details".to_string(),
        "| Type | Severity | Count | Description |".to_string(),
        "|------|----------|-------|-------------|".to_string(),
    ];

    let mut groups: BTreeMap<(Category, Severity), Vec<&Fix>> = BTreeMap::new();
    for fix in fixes {
        groups.entry((fix.category, fix.severity)).or_default().push(fix);
    }
    for ((category, severity), group) in &groups {
        lines.push(format!(
            "| {} | {} | {} | {} |",
            category,
            severity,
            group.len(),
            group[0].description
        ));
    }

    lines.push(String::new());
    lines.push("### 🚨 Critical Fixes".to_string());
    let critical: Vec<String> = fixes
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .map(|f| {
            format!(
                "- **{}:** {} ({}:{})",
                f.category,
                f.description,
                display_path(&f.file, root),
                f.line
            )
        })
        .collect();
    if critical.is_empty() {
        lines.push("None".to_string());
    } else {
        lines.extend(critical);
    }

    lines.extend(
        [
            "",
            "### ✅ Validation",
            "- [x] Syntax, semantic, style and security checks passed",
            "- [ ] Code review completed",
            "- [ ] Tests pass",
            "",
            "### 🔄 Next Steps",
            "1. Review the changes carefully",
            "2. Run tests to ensure nothing is broken",
            "3. Approve and merge if satisfied",
            "4. Request changes if modifications needed",
        ]
        .map(str::to_string),
    );
    lines.join("\n")
}

/// A PR is worth opening for any critical fix or when more than two files changed.
pub fn should_generate_pr(fixes: &[Fix]) -> bool {
    critical_count(fixes) > 0 || files_touched(fixes).len() > 2
}

/// Write `{id}.md` and `{id}.json` into `dir`.
pub fn write_pr(dir: &Path, info: &PullRequestInfo) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let md = dir.join(format!("{}.md", info.id));
    std::fs::write(&md, &info.description).map_err(|source| ToolError::WriteFailed {
        path: md.clone(),
        source,
    })?;

    let json = dir.join(format!("{}.json", info.id));
    let body = serde_json::to_string_pretty(info).context("Failed to serialize PR summary")?;
    std::fs::write(&json, body).map_err(|source| ToolError::WriteFailed {
        path: json.clone(),
        source,
    })?;

    tracing::info!(id = %info.id, "Pull request template written");
    Ok((md, json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::autofix::fixer::Risk;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fix(file: &str, category: Category, severity: Severity) -> Fix {
        Fix {
            issue_id: "id".to_string(),
            rule_id: "rule",
            category,
            severity,
            file: PathBuf::from("/repo").join(file),
            line: 4,
            description: "desc",
            before: "a".to_string(),
            after: "b".to_string(),
            confidence: 90,
            risk: Risk::from(severity),
            auto_apply: true,
        }
    }

    #[test]
    fn test_title() {
        let fixes = vec![
            fix("a.ts", Category::Security, Severity::Critical),
            fix("a.ts", Category::Quality, Severity::Low),
        ];
        assert_eq!(
            pr_title(&fixes),
            "🔧 Auto-fix: 2 issues (1 critical) - security, quality"
        );
        assert_eq!(
            pr_title(&fixes[1..]),
            "🔧 Auto-fix: 1 issues - quality"
        );
    }

    #[test]
    fn test_should_generate_pr() {
        let low = |f: &str| fix(f, Category::Quality, Severity::Low);
        assert!(!should_generate_pr(&[low("a.ts"), low("b.ts")]));
        assert!(should_generate_pr(&[low("a.ts"), low("b.ts"), low("c.ts")]));
        assert!(should_generate_pr(&[fix("a.ts", Category::Security, Severity::Critical)]));
    }

    #[test]
    fn test_description_table_and_critical_list() {
        let fixes = vec![
            fix("src/a.ts", Category::Security, Severity::Critical),
            fix("src/b.ts", Category::Quality, Severity::Low),
            fix("src/c.ts", Category::Quality, Severity::Low),
        ];
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap();
        let desc = pr_description(&fixes, "auto-fix/security/x-20260501", Path::new("/repo"), now);
        assert!(desc.contains("- **Files modified:** 3"));
        assert!(desc.contains("| quality | low | 2 | desc |"));
        assert!(desc.contains("- **security:** desc (src/a.ts:4)"));
        assert!(desc.contains("- **Generated:** 2026-05-01 09:30:00 UTC"));
    }

    #[test]
    fn test_write_pr_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join(".auto-fix/pull-requests");
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap();
        let fixes = vec![fix("src/a.ts", Category::Quality, Severity::Low)];
        let info = PullRequestInfo::new(&fixes, "auto-fix/quality/x", Path::new("/repo"), now);
        assert_eq!(info.id, "auto-fix-20260501093000");
        assert_eq!(info.files, vec!["src/a.ts".to_string()]);

        let (md, json) = write_pr(&out, &info).unwrap();
        assert!(md.ends_with("auto-fix-20260501093000.md"));
        let data: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(data["branch"], "auto-fix/quality/x");
        assert_eq!(data["fixes"], 1);
    }
}
