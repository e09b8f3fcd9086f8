//! Pattern-based Jest suites guarding against reintroduced issues.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::scanner::Issue;
use crate::errors::ToolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: &'static str,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct TestSuite {
    pub source: PathBuf,
    pub path: PathBuf,
    pub tests: Vec<TestCase>,
    /// Share of the file's issues that got a test, in percent.
    pub coverage: f64,
}

fn js_string(path: &str) -> String {
    path.replace('\\', "\\\\").replace('\'', "\\'")
}

fn pattern_test(rule_id: &str, file: &str) -> Option<TestCase> {
    let file = js_string(file);
    let (name, code) = match rule_id {
        "console-log" => (
            "Console.log detection",
            format!(
                "test('should not contain console.log statements', () => {{
    const fileContent = fs.readFileSync('{file}', 'utf-8');
    expect(fileContent).not.toMatch(/^\\s*console\\.log\\(/m);
  }});"
            ),
        ),
        "var-declaration" => (
            "Var usage detection",
            format!(
                "test('should use const/let instead of var', () => {{
    const fileContent = fs.readFileSync('{file}', 'utf-8');
    expect(fileContent).not.toMatch(/\\bvar\\s+/);
  }});"
            ),
        ),
        "todo-comment" => (
            "TODO comment formatting",
            format!(
                "test('should have formatted TODO comments', () => {{
    const fileContent = fs.readFileSync('{file}', 'utf-8');
    const todoLines = fileContent.split('\\n').filter((line) => line.includes('TODO:'));
    todoLines.forEach((line) => {{
      expect(line.trim()).toMatch(/^(\\/\\/|\\*|\\/\\*)/);
    }});
  }});"
            ),
        ),
        _ => return None,
    };
    Some(TestCase { name, code })
}

fn suite_content(name: &str, suite: &TestSuite, now: DateTime<Utc>) -> String {
    let mut content = format!(
        "// Generated test suite for {name}
// Coverage: {:.1}%
// Generated at: {}

import * as fs from 'fs';

describe('{}', () => {{
",
        suite.coverage,
        now.to_rfc3339(),
        js_string(name),
    );
    for test in &suite.tests {
        content.push_str(&format!("  // {}\n  {}\n\n", test.name, test.code));
    }
    content.push_str("});\n");
    content
}

/// Build one suite per source file that has at least one testable issue.
pub fn build_suites(issues: &[Issue], root: &Path, output_dir: &Path) -> Vec<TestSuite> {
    let mut by_file: BTreeMap<&Path, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        by_file.entry(issue.file.as_path()).or_default().push(issue);
    }

    let mut suites = Vec::new();
    for (file, file_issues) in by_file {
        let relative = file
            .strip_prefix(root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        let mut tests: Vec<TestCase> = Vec::new();
        let mut covered = 0;
        for issue in &file_issues {
            if let Some(test) = pattern_test(issue.rule_id, &relative) {
                covered += 1;
                if !tests.iter().any(|t| t.name == test.name) {
                    tests.push(test);
                }
            }
        }
        if tests.is_empty() {
            continue;
        }
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        suites.push(TestSuite {
            source: file.to_path_buf(),
            path: output_dir.join(format!("{}.test.ts", stem)),
            tests,
            coverage: (covered as f64 / file_issues.len() as f64 * 100.0).min(100.0),
        });
    }
    suites
}

pub fn generate_tests(
    issues: &[Issue],
    root: &Path,
    output_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<TestSuite>> {
    let suites = build_suites(issues, root, output_dir);
    if suites.is_empty() {
        return Ok(suites);
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    for suite in &suites {
        let name = suite
            .path
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(".test.ts").to_string())
            .unwrap_or_default();
        std::fs::write(&suite.path, suite_content(&name, suite, now)).map_err(|source| {
            ToolError::WriteFailed {
                path: suite.path.clone(),
                source,
            }
        })?;
        tracing::info!(path = %suite.path.display(), tests = suite.tests.len(), "Test suite written");
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::autofix::scanner::scan_content;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_suites_grouped_per_file() {
        let root = Path::new("/project");
        let mut issues = scan_content(
            &root.join("src/beds.ts"),
            "console.log(a);\nconsole.log(b);\nvar x = 1;\nlet y: any = 2;\n",
        );
        issues.extend(scan_content(&root.join("src/clean.ts"), "let z: any = 3;\n"));

        let suites = build_suites(&issues, root, Path::new("out"));
        assert_eq!(suites.len(), 1);
        let suite = &suites[0];
        assert_eq!(suite.path, PathBuf::from("out/beds.test.ts"));
        let names: Vec<_> = suite.tests.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Console.log detection", "Var usage detection"]);
        // 3 of 4 issues covered
        assert_eq!(suite.coverage, 75.0);
        assert!(suite.tests[0].code.contains("readFileSync('src/beds.ts'"));
    }

    #[test]
    fn test_generate_writes_jest_files() {
        let dir = tempdir().unwrap();
        let issues = scan_content(&dir.path().join("app/page.tsx"), "  TODO: water the roses\n");
        let out = dir.path().join("ai-pipeline-tests");

        let suites = generate_tests(&issues, dir.path(), &out, Utc::now()).unwrap();
        assert_eq!(suites.len(), 1);
        let content = fs::read_to_string(out.join("page.test.ts")).unwrap();
        assert!(content.contains("describe('page', () => {"));
        assert!(content.contains("should have formatted TODO comments"));
        assert!(content.contains("readFileSync('app/page.tsx'"));
        assert!(content.trim_end().ends_with("});"));
    }

    #[test]
    fn test_no_testable_issues_writes_nothing() {
        let dir = tempdir().unwrap();
        let issues = scan_content(&dir.path().join("a.ts"), "let y: any = 2;\n");
        let out = dir.path().join("tests-out");
        assert!(generate_tests(&issues, dir.path(), &out, Utc::now()).unwrap().is_empty());
        assert!(!out.exists());
    }
}
