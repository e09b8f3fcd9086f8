//! Line-by-line scanning of source files against the rule tables.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::rules::{Category, Rule, Severity, default_rules};
use crate::errors::ToolError;

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", ".next", "target"];

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub id: String,
    pub rule_id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub file: PathBuf,
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    /// The full source line, without its line terminator.
    pub code: String,
    pub message: &'static str,
    pub suggestion: &'static str,
}

fn issue_id(rule: &Rule, file: &Path, line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.to_string_lossy().as_bytes());
    hasher.update(line.to_le_bytes());
    hasher.update(rule.id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", rule.id, &digest[..8])
}

/// Match every rule against every line of `content`.
pub fn scan_content(file: &Path, content: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (idx, raw) in content.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }
        for rule in default_rules() {
            if let Some(start) = rule.matches(line) {
                issues.push(Issue {
                    id: issue_id(rule, file, idx + 1),
                    rule_id: rule.id,
                    category: rule.category,
                    severity: rule.severity,
                    file: file.to_path_buf(),
                    line: idx + 1,
                    column: line[..start].chars().count() + 1,
                    code: line.to_string(),
                    message: rule.message,
                    suggestion: rule.suggestion,
                });
            }
        }
    }
    issues
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Source files under `root`, or `root` itself when it is a file.
pub fn source_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

pub fn scan_path(root: &Path) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    for file in source_files(root) {
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::debug!(path = %file.display(), "Skipping non-UTF-8 file");
                continue;
            }
            Err(source) => {
                return Err(ToolError::ReadFailed {
                    path: file.clone(),
                    source,
                }
                .into());
            }
        };
        issues.extend(scan_content(&file, &content));
    }
    tracing::info!(root = %root.display(), issues = issues.len(), "Scan complete");
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_content_positions() {
        let content = "const a = 1;\n  el.innerHTML = html;\r\nvar b = eval(x);\n";
        let issues = scan_content(Path::new("src/a.ts"), content);

        let inner = issues.iter().find(|i| i.rule_id == "inner-html").unwrap();
        assert_eq!(inner.line, 2);
        assert_eq!(inner.column, 5);
        assert_eq!(inner.code, "  el.innerHTML = html;");
        assert_eq!(inner.severity, Severity::High);

        let rules: Vec<_> = issues.iter().filter(|i| i.line == 3).map(|i| i.rule_id).collect();
        assert!(rules.contains(&"eval-usage"));
        assert!(rules.contains(&"var-declaration"));
    }

    #[test]
    fn test_issue_ids_stable_and_distinct() {
        let a = scan_content(Path::new("a.ts"), "var x = 1;");
        let b = scan_content(Path::new("a.ts"), "var x = 1;");
        let c = scan_content(Path::new("b.ts"), "var x = 1;");
        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].id, c[0].id);
        assert!(a[0].id.starts_with("var-declaration-"));
    }

    #[test]
    fn test_clean_content_has_no_issues() {
        let content = "export const sum = (a: number, b: number): number => a + b;\n";
        assert!(scan_content(Path::new("sum.ts"), content).is_empty());
    }

    #[test]
    fn test_scan_path_skips_vendor_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".next/server")).unwrap();
        fs::write(dir.path().join("src/page.tsx"), "console.log(bed);\n").unwrap();
        fs::write(dir.path().join("src/notes.md"), "console.log(x);\n").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "eval(x);\n").unwrap();
        fs::write(dir.path().join(".next/server/page.js"), "eval(x);\n").unwrap();

        let issues = scan_path(dir.path()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "console-log");
        assert!(issues[0].file.ends_with("src/page.tsx"));
    }

    #[test]
    fn test_scan_single_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("util.js");
        fs::write(&file, "const list = new Array();\n").unwrap();
        let issues = scan_path(&file).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "new-array");
    }
}
