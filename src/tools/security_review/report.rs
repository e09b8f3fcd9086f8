//! Post-processing of the model output: severity counts, the summary
//! header, completeness checks and the blocking verdict.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Hidden marker identifying the sticky review comment.
pub const COMMENT_MARKER: &str = "<!-- ai-security-review -->";

pub const CRITICAL_HEADING: &str = "### 🚨 Critical Issues";
pub const HIGH_HEADING: &str = "### ⚠️ High Priority Issues";
pub const MEDIUM_HEADING: &str = "### 🔶 Medium Priority Issues";
pub const LOW_HEADING: &str = "### 📝 Low Priority Issues";

static ISSUE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Issue\*\*:\s*([^\n]+)").unwrap());
static FILE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*File\*\*:\s*`[^`]+`").unwrap());
static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Lines?\*\*:\s*\d+").unwrap());
static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static BLOCKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)### 🚨 Critical|### ⚠️ High").unwrap());

/// Body of the section that starts at `heading`, up to the next heading.
fn section<'a>(report: &'a str, heading: &str) -> Option<&'a str> {
    let start = report.find(heading)? + heading.len();
    let rest = &report[start..];
    let end = ["\n### ", "\n## "]
        .iter()
        .filter_map(|h| rest.find(h))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn count_findings(report: &str, heading: &str) -> usize {
    section(report, heading)
        .map(|s| s.matches("**File**:").count())
        .unwrap_or(0)
}

fn first_issue(report: &str, heading: &str) -> Option<String> {
    section(report, heading)
        .and_then(|s| ISSUE_TITLE.captures(s))
        .map(|c| c[1].trim().to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn from_report(report: &str) -> Self {
        Self {
            critical: count_findings(report, CRITICAL_HEADING),
            high: count_findings(report, HIGH_HEADING),
            medium: count_findings(report, MEDIUM_HEADING),
            low: count_findings(report, LOW_HEADING),
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// The most severe finding's title, or a generic description.
pub fn most_critical(report: &str, counts: &SeverityCounts) -> String {
    if counts.critical > 0 {
        first_issue(report, CRITICAL_HEADING)
            .unwrap_or_else(|| "Critical security vulnerabilities detected".to_string())
    } else if counts.high > 0 {
        first_issue(report, HIGH_HEADING)
            .unwrap_or_else(|| "High severity security issues detected".to_string())
    } else {
        "No security issues found".to_string()
    }
}

/// Summary header built from the detailed findings.
pub fn summarize(findings: &str, files_analyzed: usize) -> String {
    let counts = SeverityCounts::from_report(findings);
    let mut out = format!(
        "## 🔒 Security Review Summary\n\
         - **Total Issues Found**: {}\n\
         - **Critical**: {} | **High**: {} | **Medium**: {} | **Low**: {}\n\
         - **Files Analyzed**: {}\n\
         - **Most Critical**: {}\n\n\
         ## 📊 Issue Overview by Severity\n\n",
        counts.total(),
        counts.critical,
        counts.high,
        counts.medium,
        counts.low,
        files_analyzed,
        most_critical(findings, &counts),
    );

    let rows = [
        (
            counts.critical,
            "🚨 Critical Severity Issues",
            "critical security vulnerabilities requiring immediate attention",
        ),
        (
            counts.high,
            "⚠️ High Severity Issues",
            "high-priority security issues that should be fixed this week",
        ),
        (
            counts.medium,
            "🔶 Medium Severity Issues",
            "medium-priority security improvements for next sprint",
        ),
        (
            counts.low,
            "📝 Low Severity Issues",
            "low-priority hardening improvements for future releases",
        ),
    ];
    for (count, title, text) in rows {
        if count > 0 {
            out.push_str(&format!("### {} ({})\n{} {}\n\n", title, count, count, text));
        }
    }
    if counts.total() == 0 {
        out.push_str(
            "### ✅ No Security Issues Detected\nAll analyzed files appear to follow secure coding practices.\n\n",
        );
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportValidation {
    pub has_file_references: bool,
    pub has_line_numbers: bool,
    pub has_code_examples: bool,
    pub has_checkboxes: bool,
    pub missing: Vec<&'static str>,
}

impl ReportValidation {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn validate_report(report: &str) -> ReportValidation {
    let mut v = ReportValidation {
        has_file_references: FILE_REFERENCE.is_match(report),
        has_line_numbers: LINE_NUMBER.is_match(report),
        has_code_examples: CODE_BLOCK.find_iter(report).count() >= 2,
        has_checkboxes: report.contains("- [ ]"),
        missing: Vec::new(),
    };
    if !v.has_file_references {
        v.missing.push("Missing file references");
    }
    if !v.has_line_numbers {
        v.missing.push("Missing line numbers");
    }
    if !v.has_code_examples {
        v.missing.push("Missing code examples");
    }
    if !v.has_checkboxes {
        v.missing.push("Missing checkbox action items");
    }
    v
}

pub fn has_blocking_findings(report: &str) -> bool {
    BLOCKING.is_match(report)
}

/// Full comment body, with the sticky marker and a timestamped title.
pub fn comment_body(body: &str, timestamp: &str) -> String {
    format!(
        "{}\n# 🔒 AI Security Review - {}\n\n{}",
        COMMENT_MARKER, timestamp, body
    )
}

pub fn no_targets_body() -> String {
    "## 🔒 Security Review Summary\n\nNo reviewable code changes detected in this PR. Only binary, configuration, or excluded files were modified.".to_string()
}

pub fn failure_body(error: &str) -> String {
    format!(
        "## 🚨 AI Security Review Failed\n\nThe automated security review encountered an error:\n\n```\n{}\n```\n\nPlease check the CI logs for more details.",
        error
    )
}

pub const VALIDATION_NOTE: &str = "\n\n---\n*Note: Review validation detected some formatting issues but proceeding with current analysis.*";
