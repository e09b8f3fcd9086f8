//! Turning issues into concrete line rewrites and applying them.

use anyhow::{Result, bail};
use serde::Serialize;
use std::path::PathBuf;

use super::rules::{Category, Severity, find_rule};
use super::scanner::Issue;

/// Fixes above this confidence may be applied without review.
pub const AUTO_APPLY_CONFIDENCE: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl From<Severity> for Risk {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Risk::Low,
            Severity::Medium => Risk::Medium,
            Severity::High | Severity::Critical => Risk::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fix {
    pub issue_id: String,
    pub rule_id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub file: PathBuf,
    pub line: usize,
    pub description: &'static str,
    pub before: String,
    pub after: String,
    pub confidence: u8,
    pub risk: Risk,
    pub auto_apply: bool,
}

/// The fix for `issue`, when its rule has a mechanical rewrite for the line.
pub fn propose_fix(issue: &Issue) -> Option<Fix> {
    let rule = find_rule(issue.rule_id)?;
    let after = rule.rewrite(&issue.code)?;
    Some(Fix {
        issue_id: issue.id.clone(),
        rule_id: rule.id,
        category: rule.category,
        severity: rule.severity,
        file: issue.file.clone(),
        line: issue.line,
        description: rule.message,
        before: issue.code.clone(),
        after,
        confidence: rule.confidence,
        risk: Risk::from(rule.severity),
        auto_apply: rule.severity != Severity::Critical && rule.confidence > AUTO_APPLY_CONFIDENCE,
    })
}

/// Replace line `fix.line` of `content`, which must still read `fix.before`.
pub fn apply_fix(content: &str, fix: &Fix) -> Result<String> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let Some(slot) = fix.line.checked_sub(1).and_then(|i| lines.get_mut(i)) else {
        bail!(
            "Line {} is out of range for {}",
            fix.line,
            fix.file.display()
        );
    };
    let cr = if slot.ends_with('\r') { "\r" } else { "" };
    if slot.trim_end_matches('\r') != fix.before {
        bail!(
            "{}:{} changed since it was scanned",
            fix.file.display(),
            fix.line
        );
    }
    *slot = format!("{}{}", fix.after, cr);
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::autofix::scanner::scan_content;
    use std::path::Path;

    fn fixes_for(content: &str) -> Vec<Fix> {
        scan_content(Path::new("src/app.ts"), content)
            .iter()
            .filter_map(propose_fix)
            .collect()
    }

    #[test]
    fn test_auto_apply_threshold() {
        let fixes = fixes_for("var a = new Object();\n");
        assert_eq!(fixes.len(), 2);
        assert!(fixes.iter().all(|f| f.auto_apply));

        // Confidence 70 is below the threshold
        let fixes = fixes_for("let a: any = 1;\n");
        assert_eq!(fixes.len(), 1);
        assert!(!fixes[0].auto_apply);
        assert_eq!(fixes[0].risk, Risk::Medium);

        // Critical never auto-applies
        let fixes = fixes_for("eval(input);\n");
        assert_eq!(fixes[0].severity, Severity::Critical);
        assert_eq!(fixes[0].risk, Risk::High);
        assert!(!fixes[0].auto_apply);
    }

    #[test]
    fn test_manual_rules_have_no_fix() {
        assert!(fixes_for("for (let i = 0; i < beds.length; i++) {\n").is_empty());
    }

    #[test]
    fn test_apply_fix_replaces_only_that_line() {
        let content = "const a = 1;\r\nvar b = 2;\r\nvar c = 3;\r\n";
        let fixes = fixes_for(content);
        let fix = fixes.iter().find(|f| f.line == 2).unwrap();
        let out = apply_fix(content, fix).unwrap();
        assert_eq!(out, "const a = 1;\r\nlet b = 2;\r\nvar c = 3;\r\n");
    }

    #[test]
    fn test_apply_fix_rejects_stale_line() {
        let fixes = fixes_for("var b = 2;\n");
        assert!(apply_fix("var b = 3;\n", &fixes[0]).is_err());
        let mut out_of_range = fixes[0].clone();
        out_of_range.line = 9;
        assert!(apply_fix("var b = 2;\n", &out_of_range).is_err());
    }
}
