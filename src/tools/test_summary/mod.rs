//! Test summary: combines Jest results and coverage into quality metrics
//! and writes Markdown, HTML and JSON reports.

pub mod render;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::TestSummarySection;
use crate::errors::ToolError;

/// Directories scanned for test files when no Jest results exist.
const TEST_DIRS: &[&str] = &["__tests__", "tests", "src", "components", "app"];

pub const JEST_RESULTS_FILE: &str = "jest-results.json";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JestResults {
    num_total_tests: u64,
    num_passed_tests: u64,
    num_failed_tests: u64,
    num_pending_tests: u64,
    num_total_test_suites: u64,
    num_passed_test_suites: u64,
    num_failed_test_suites: u64,
    test_results: Vec<JestSuite>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JestSuite {
    start_time: Option<i64>,
    end_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CoverageSummary {
    total: CoverageTotals,
}

#[derive(Debug, Deserialize)]
struct CoverageTotals {
    lines: CoverageMetric,
    branches: CoverageMetric,
    functions: CoverageMetric,
    statements: CoverageMetric,
}

#[derive(Debug, Deserialize)]
struct CoverageMetric {
    #[serde(default)]
    pct: Option<f64>,
}

impl CoverageMetric {
    fn rounded(&self) -> u32 {
        self.pct.unwrap_or(0.0).max(0.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Jest,
    FileScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub pending_tests: u64,
    pub total_suites: u64,
    pub passed_suites: u64,
    pub failed_suites: u64,
    pub duration_ms: u64,
    pub source: ResultSource,
}

impl TestResults {
    fn from_jest(jest: &JestResults) -> Self {
        let duration_ms = jest
            .test_results
            .iter()
            .filter_map(|s| Some(s.end_time? - s.start_time?))
            .filter(|d| *d > 0)
            .sum::<i64>() as u64;
        Self {
            total_tests: jest.num_total_tests,
            passed_tests: jest.num_passed_tests,
            failed_tests: jest.num_failed_tests,
            pending_tests: jest.num_pending_tests,
            total_suites: jest.num_total_test_suites,
            passed_suites: jest.num_passed_test_suites,
            failed_suites: jest.num_failed_test_suites,
            duration_ms,
            source: ResultSource::Jest,
        }
    }

    /// Every discovered test file counts as one passing test.
    fn from_test_files(count: u64) -> Self {
        Self {
            total_tests: count,
            passed_tests: count,
            failed_tests: 0,
            pending_tests: 0,
            total_suites: count,
            passed_suites: count,
            failed_suites: 0,
            duration_ms: 0,
            source: ResultSource::FileScan,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed_tests == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub lines: u32,
    pub branches: u32,
    pub functions: u32,
    pub statements: u32,
}

impl Coverage {
    pub fn score(&self) -> u32 {
        let sum = self.lines + self.branches + self.functions + self.statements;
        (sum as f64 / 4.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    NeedsImprovement,
}

impl Grade {
    pub fn for_score(score: u32) -> Self {
        match score {
            80.. => Grade::Excellent,
            60..=79 => Grade::Good,
            _ => Grade::NeedsImprovement,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::Excellent => "🟢 Excellent",
            Grade::Good => "🟡 Good",
            Grade::NeedsImprovement => "🔴 Needs Improvement",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::NeedsImprovement => "needs-improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub success_rate: u32,
    pub coverage_score: u32,
    pub test_density: u32,
    pub overall_score: u32,
    pub grade: Grade,
}

impl QualityMetrics {
    pub fn compute(results: &TestResults, coverage: &Coverage) -> Self {
        let success_rate = if results.total_tests > 0 {
            (results.passed_tests as f64 / results.total_tests as f64 * 100.0).round() as u32
        } else {
            0
        };
        let coverage_score = coverage.score();
        let test_density = ((results.total_tests as f64 / 10.0).round() as u32).min(100);
        let overall_score = (success_rate as f64 * 0.4
            + coverage_score as f64 * 0.4
            + test_density as f64 * 0.2)
            .round() as u32;
        Self {
            success_rate,
            coverage_score,
            test_density,
            overall_score,
            grade: Grade::for_score(overall_score),
        }
    }
}

/// Estimated share of failures per test category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCategory {
    pub name: &'static str,
    pub path: &'static str,
    pub share_percent: u32,
    pub estimated: u64,
}

const FAILURE_SHARES: &[(&str, &str, u32)] = &[
    ("Unit", "__tests__/unit/", 40),
    ("Integration", "__tests__/integration/", 30),
    ("Component", "__tests__/unit/components/", 20),
    ("Other", "__tests__/", 10),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    pub total_failed: u64,
    pub failed_suites: u64,
    pub categories: Vec<FailureCategory>,
}

impl FailureAnalysis {
    /// Jest's JSON carries no per-test categories, so the split is an estimate.
    pub fn estimate(results: &TestResults) -> Self {
        let categories = if results.failed_tests > 0 {
            FAILURE_SHARES
                .iter()
                .map(|&(name, path, share)| FailureCategory {
                    name,
                    path,
                    share_percent: share,
                    estimated: (results.failed_tests as f64 * share as f64 / 100.0).round()
                        as u64,
                })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            total_failed: results.failed_tests,
            failed_suites: results.failed_suites,
            categories,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub results: TestResults,
    pub coverage: Coverage,
    pub metrics: QualityMetrics,
    pub failures: FailureAnalysis,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl TestSummary {
    pub fn new(results: TestResults, coverage: Coverage, generated_at: DateTime<Utc>) -> Self {
        let metrics = QualityMetrics::compute(&results, &coverage);
        let failures = FailureAnalysis::estimate(&results);
        let recommendations = recommendations(&results, &coverage, &metrics);
        Self {
            results,
            coverage,
            metrics,
            failures,
            recommendations,
            generated_at,
        }
    }

    /// Read results and coverage from the project, falling back to a file scan.
    pub fn collect(project_dir: &Path, section: &TestSummarySection) -> Result<Self> {
        let results_path = resolve(project_dir, &section.results_dir).join(JEST_RESULTS_FILE);
        let results = if results_path.exists() {
            let jest: JestResults = read_json(&results_path)?;
            TestResults::from_jest(&jest)
        } else {
            tracing::warn!(path = %results_path.display(), "Jest results not found; scanning for test files");
            TestResults::from_test_files(count_test_files(project_dir))
        };

        let coverage_path = resolve(project_dir, &section.coverage_file);
        let coverage = if coverage_path.exists() {
            let summary: CoverageSummary = read_json(&coverage_path)?;
            Coverage {
                lines: summary.total.lines.rounded(),
                branches: summary.total.branches.rounded(),
                functions: summary.total.functions.rounded(),
                statements: summary.total.statements.rounded(),
            }
        } else {
            tracing::warn!(path = %coverage_path.display(), "Coverage summary not found; using zero coverage");
            Coverage::default()
        };

        Ok(Self::new(results, coverage, Utc::now()))
    }
}

fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ToolError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn is_test_file(name: &str) -> bool {
    name.contains(".test.") || name.contains(".spec.")
}

/// Count `*.test.*` / `*.spec.*` files under the conventional test directories.
pub fn count_test_files(project_dir: &Path) -> u64 {
    TEST_DIRS
        .iter()
        .map(|dir| project_dir.join(dir))
        .filter(|dir| dir.is_dir())
        .map(|dir| {
            WalkDir::new(dir)
                .into_iter()
                .filter_entry(|e| e.file_name().to_str() != Some("node_modules"))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| is_test_file(&e.file_name().to_string_lossy()))
                .count() as u64
        })
        .sum()
}

fn recommendations(
    results: &TestResults,
    coverage: &Coverage,
    metrics: &QualityMetrics,
) -> Vec<String> {
    let mut out = Vec::new();
    if metrics.success_rate < 90 {
        out.push("**Fix failing tests** to improve success rate".to_string());
    }
    if coverage.lines < 80 {
        out.push("**Increase code coverage** to meet quality standards".to_string());
    }
    if results.total_tests < 50 {
        out.push("**Add more tests** to improve test density".to_string());
    }
    if results.failed_suites > 0 {
        out.push("**Investigate test suite failures** for systematic issues".to_string());
    }
    if out.is_empty() {
        out.push("**Maintain current quality** - all metrics are excellent".to_string());
    }
    out
}

/// Write the four report files into `out_dir`, creating it when missing.
pub fn write_reports(summary: &TestSummary, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let json = serde_json::to_string_pretty(&render::json_data(summary))
        .context("Failed to serialize summary data")?;
    let reports = [
        ("summary.md", render::summary_markdown(summary)),
        ("detailed-report.md", render::detailed_markdown(summary)),
        ("test-summary.html", render::html(summary)),
        ("summary-data.json", json),
    ];

    let mut written = Vec::with_capacity(reports.len());
    for (name, content) in reports {
        let path = out_dir.join(name);
        std::fs::write(&path, content).map_err(|source| ToolError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    tracing::info!(dir = %out_dir.display(), files = written.len(), "Test reports written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn results(total: u64, passed: u64, failed: u64) -> TestResults {
        TestResults {
            total_tests: total,
            passed_tests: passed,
            failed_tests: failed,
            pending_tests: total - passed - failed,
            total_suites: 10,
            passed_suites: if failed > 0 { 9 } else { 10 },
            failed_suites: if failed > 0 { 1 } else { 0 },
            duration_ms: 1200,
            source: ResultSource::Jest,
        }
    }

    #[test]
    fn test_quality_metrics() {
        let coverage = Coverage {
            lines: 80,
            branches: 70,
            functions: 90,
            statements: 81,
        };
        let metrics = QualityMetrics::compute(&results(200, 190, 10), &coverage);
        assert_eq!(metrics.success_rate, 95);
        assert_eq!(metrics.coverage_score, 80);
        assert_eq!(metrics.test_density, 20);
        // 0.4 * 95 + 0.4 * 80 + 0.2 * 20 = 74
        assert_eq!(metrics.overall_score, 74);
        assert_eq!(metrics.grade, Grade::Good);
    }

    #[test]
    fn test_density_is_capped() {
        let metrics = QualityMetrics::compute(&results(5000, 5000, 0), &Coverage::default());
        assert_eq!(metrics.test_density, 100);
        assert_eq!(metrics.success_rate, 100);
    }

    #[test]
    fn test_no_tests_scores_zero() {
        let metrics = QualityMetrics::compute(&TestResults::from_test_files(0), &Coverage::default());
        assert_eq!(metrics.success_rate, 0);
        assert_eq!(metrics.overall_score, 0);
        assert_eq!(metrics.grade, Grade::NeedsImprovement);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::for_score(80), Grade::Excellent);
        assert_eq!(Grade::for_score(79), Grade::Good);
        assert_eq!(Grade::for_score(60), Grade::Good);
        assert_eq!(Grade::for_score(59), Grade::NeedsImprovement);
        assert_eq!(Grade::Excellent.label(), "🟢 Excellent");
    }

    #[test]
    fn test_failure_estimate() {
        let analysis = FailureAnalysis::estimate(&results(100, 90, 10));
        let estimates: Vec<u64> = analysis.categories.iter().map(|c| c.estimated).collect();
        assert_eq!(estimates, vec![4, 3, 2, 1]);
        assert_eq!(analysis.categories[0].name, "Unit");

        assert!(FailureAnalysis::estimate(&results(10, 10, 0)).categories.is_empty());
    }

    #[test]
    fn test_recommendations() {
        let summary = TestSummary::new(results(20, 10, 10), Coverage::default(), Utc::now());
        assert_eq!(summary.recommendations.len(), 4);

        let coverage = Coverage {
            lines: 90,
            branches: 90,
            functions: 90,
            statements: 90,
        };
        let summary = TestSummary::new(results(100, 100, 0), coverage, Utc::now());
        assert_eq!(
            summary.recommendations,
            vec!["**Maintain current quality** - all metrics are excellent".to_string()]
        );
    }

    #[test]
    fn test_collect_from_jest_and_coverage() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("test-results")).unwrap();
        fs::create_dir_all(dir.path().join("coverage")).unwrap();
        fs::write(
            dir.path().join("test-results/jest-results.json"),
            r#"{
                "numTotalTests": 40, "numPassedTests": 38, "numFailedTests": 2, "numPendingTests": 0,
                "numTotalTestSuites": 5, "numPassedTestSuites": 4, "numFailedTestSuites": 1,
                "testResults": [
                    {"startTime": 1000, "endTime": 1500},
                    {"startTime": 2000, "endTime": 2250},
                    {"name": "no timing"}
                ]
            }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("coverage/coverage-summary.json"),
            r#"{"total": {
                "lines": {"pct": 81.6}, "branches": {"pct": 64.2},
                "functions": {"pct": 70.5}, "statements": {"pct": 80.1}
            }}"#,
        )
        .unwrap();

        let summary = TestSummary::collect(dir.path(), &TestSummarySection::default()).unwrap();
        assert_eq!(summary.results.source, ResultSource::Jest);
        assert_eq!(summary.results.total_tests, 40);
        assert_eq!(summary.results.duration_ms, 750);
        assert_eq!(summary.coverage.lines, 82);
        assert_eq!(summary.coverage.branches, 64);
        assert_eq!(summary.coverage.functions, 71);
        assert_eq!(summary.results.failed_suites, 1);
    }

    #[test]
    fn test_collect_falls_back_to_file_scan() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("__tests__/unit")).unwrap();
        fs::create_dir_all(dir.path().join("src/node_modules/pkg")).unwrap();
        fs::write(dir.path().join("__tests__/unit/a.test.ts"), "").unwrap();
        fs::write(dir.path().join("__tests__/unit/b.spec.tsx"), "").unwrap();
        fs::write(dir.path().join("__tests__/unit/helpers.ts"), "").unwrap();
        fs::write(dir.path().join("src/node_modules/pkg/x.test.js"), "").unwrap();

        let summary = TestSummary::collect(dir.path(), &TestSummarySection::default()).unwrap();
        assert_eq!(summary.results.source, ResultSource::FileScan);
        assert_eq!(summary.results.total_tests, 2);
        assert_eq!(summary.results.passed_tests, 2);
        assert_eq!(summary.coverage, Coverage::default());
    }

    #[test]
    fn test_malformed_results_is_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("test-results")).unwrap();
        fs::write(dir.path().join("test-results/jest-results.json"), "not json").unwrap();
        assert!(TestSummary::collect(dir.path(), &TestSummarySection::default()).is_err());
    }

    #[test]
    fn test_write_reports_creates_all_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let summary = TestSummary::new(results(100, 95, 5), Coverage::default(), Utc::now());
        let written = write_reports(&summary, &out).unwrap();
        assert_eq!(written.len(), 4);
        for name in ["summary.md", "detailed-report.md", "test-summary.html", "summary-data.json"] {
            assert!(out.join(name).exists(), "{} missing", name);
        }
        let data: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("summary-data.json")).unwrap())
                .unwrap();
        assert_eq!(data["testResults"]["totalTests"], 100);
    }
}
