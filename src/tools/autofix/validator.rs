//! Checks a proposed rewrite must pass before it is written to disk.

use serde::Serialize;

use super::fixer::Fix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Check {
    Syntax,
    Semantic,
    Style,
    Security,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub check: Check,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn pass(check: Check) -> Self {
        Self {
            check,
            passed: true,
            message: "ok".to_string(),
        }
    }

    fn fail(check: Check, message: impl Into<String>) -> Self {
        Self {
            check,
            passed: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub passed: usize,
    pub failed: usize,
    pub all_passed: bool,
    pub results: Vec<CheckResult>,
}

impl ValidationSummary {
    fn from_results(results: Vec<CheckResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = results.len() - passed;
        Self {
            passed,
            failed,
            all_passed: failed == 0,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Net bracket depth change of a line.
fn bracket_balance(line: &str) -> i64 {
    line.chars().fold(0, |depth, c| match c {
        '(' | '[' | '{' => depth + 1,
        ')' | ']' | '}' => depth - 1,
        _ => depth,
    })
}

fn introduces(before: &str, after: &str, needle: &str) -> bool {
    after.contains(needle) && !before.contains(needle)
}

#[derive(Debug, Clone)]
pub struct Validator {
    max_line_length: usize,
}

impl Validator {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    pub fn validate(&self, fix: &Fix) -> ValidationSummary {
        ValidationSummary::from_results(vec![
            self.syntax(fix),
            self.semantic(fix),
            self.style(fix),
            self.security(fix),
        ])
    }

    fn syntax(&self, fix: &Fix) -> CheckResult {
        if fix.after.trim_start().starts_with("//") {
            return CheckResult::pass(Check::Syntax);
        }
        if bracket_balance(&fix.before) != bracket_balance(&fix.after) {
            return CheckResult::fail(Check::Syntax, "Rewrite changes bracket balance");
        }
        for literal in ["undefined", "null"] {
            if introduces(&fix.before, &fix.after, literal) {
                return CheckResult::fail(
                    Check::Syntax,
                    format!("Rewrite introduces `{}`", literal),
                );
            }
        }
        CheckResult::pass(Check::Syntax)
    }

    fn semantic(&self, fix: &Fix) -> CheckResult {
        if fix.after == fix.before {
            CheckResult::fail(Check::Semantic, "Rewrite does not change the line")
        } else if fix.after.trim().is_empty() {
            CheckResult::fail(Check::Semantic, "Rewrite empties the line")
        } else {
            CheckResult::pass(Check::Semantic)
        }
    }

    fn style(&self, fix: &Fix) -> CheckResult {
        let len = fix.after.chars().count();
        if len > self.max_line_length {
            return CheckResult::fail(
                Check::Style,
                format!("Line is {} characters (max {})", len, self.max_line_length),
            );
        }
        let indent = fix.after.len() - fix.after.trim_start_matches(' ').len();
        if indent == 1 {
            return CheckResult::fail(Check::Style, "Single-space indentation");
        }
        CheckResult::pass(Check::Style)
    }

    fn security(&self, fix: &Fix) -> CheckResult {
        let after = &fix.after;
        if after.contains("eval(") || after.contains("innerHTML") {
            return CheckResult::fail(Check::Security, "Line still contains eval or innerHTML");
        }
        if after.contains("console.log") && after.to_lowercase().contains("password") {
            return CheckResult::fail(Check::Security, "Line logs a password");
        }
        CheckResult::pass(Check::Security)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::autofix::fixer::Risk;
    use crate::tools::autofix::rules::{Category, Severity};
    use std::path::PathBuf;

    fn fix(before: &str, after: &str) -> Fix {
        Fix {
            issue_id: "var-declaration-0000".to_string(),
            rule_id: "var-declaration",
            category: Category::Quality,
            severity: Severity::Low,
            file: PathBuf::from("a.ts"),
            line: 1,
            description: "var declaration",
            before: before.to_string(),
            after: after.to_string(),
            confidence: 85,
            risk: Risk::Low,
            auto_apply: true,
        }
    }

    fn failed_checks(summary: &ValidationSummary) -> Vec<Check> {
        summary.failures().map(|r| r.check).collect()
    }

    #[test]
    fn test_valid_fix_passes_all() {
        let summary = Validator::new(120).validate(&fix("var x = 1;", "let x = 1;"));
        assert!(summary.all_passed);
        assert_eq!(summary.passed, 4);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_syntax_checks() {
        let v = Validator::new(120);
        assert_eq!(
            failed_checks(&v.validate(&fix("f(a);", "f(a;"))),
            vec![Check::Syntax]
        );
        assert_eq!(
            failed_checks(&v.validate(&fix("let x = a;", "let x = null;"))),
            vec![Check::Syntax]
        );
        // Commented-out code is not parsed
        assert!(v.validate(&fix("f(a", "// f(a")).all_passed);
    }

    #[test]
    fn test_semantic_checks() {
        let v = Validator::new(120);
        assert_eq!(
            failed_checks(&v.validate(&fix("let x = 1;", "let x = 1;"))),
            vec![Check::Semantic]
        );
        assert!(failed_checks(&v.validate(&fix("x;  ", "   "))).contains(&Check::Semantic));
    }

    #[test]
    fn test_style_checks() {
        let v = Validator::new(20);
        assert_eq!(
            failed_checks(&v.validate(&fix("var x = 1;", &format!("let x = {};", "1".repeat(30))))),
            vec![Check::Style]
        );
        assert_eq!(
            failed_checks(&v.validate(&fix("var x = 1;", " let x = 1;"))),
            vec![Check::Style]
        );
        assert!(v.validate(&fix("  var x = 1;", "  let x = 1;")).all_passed);
    }

    #[test]
    fn test_security_checks() {
        let v = Validator::new(120);
        assert!(failed_checks(&v.validate(&fix("eval(x);", "// eval(x);"))).contains(&Check::Security));
        assert!(
            failed_checks(&v.validate(&fix("var p = 1; console.log(password);", "let p = 1; console.log(password);")))
                .contains(&Check::Security)
        );
    }
}
