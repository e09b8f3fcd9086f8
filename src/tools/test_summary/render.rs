//! Report renderers for a [`TestSummary`].

use serde_json::{Value, json};

use super::{Grade, TestSummary};

const VERSION: &str = "1.0.0";

fn status_line(summary: &TestSummary) -> &'static str {
    if summary.results.all_passed() {
        "✅ ALL TESTS PASSED"
    } else {
        "❌ SOME TESTS FAILED"
    }
}

fn coverage_dot(pct: u32) -> &'static str {
    match Grade::for_score(pct) {
        Grade::Excellent => "🟢",
        Grade::Good => "🟡",
        Grade::NeedsImprovement => "🔴",
    }
}

const QUICK_ACTIONS: &str = "# Run all tests
npm run test:ci

# Generate summary only
npm run test:summary

# Full test suite with report
npm run test:report";

pub fn summary_markdown(summary: &TestSummary) -> String {
    let r = &summary.results;
    let c = &summary.coverage;
    let m = &summary.metrics;
    format!(
        "# 🧪 TEST EXECUTION SUMMARY

## 📊 Status
**{status}**

## 🎯 Overall Quality Score
**{overall}/100** {grade}

## 📈 Key Metrics
- **Total Tests**: {total}
- **Passed**: {passed} ✅
- **Failed**: {failed} ❌
- **Pending**: {pending} ⏳
- **Success Rate**: {success}%
- **Duration**: {duration}ms

## 📊 Coverage
- **Lines**: {lines}%
- **Branches**: {branches}%
- **Functions**: {functions}%
- **Statements**: {statements}%

## 🚀 Quick Actions
```bash
{actions}
```

---
*Generated on {generated}*
",
        status = status_line(summary),
        overall = m.overall_score,
        grade = m.grade.label(),
        total = r.total_tests,
        passed = r.passed_tests,
        failed = r.failed_tests,
        pending = r.pending_tests,
        success = m.success_rate,
        duration = r.duration_ms,
        lines = c.lines,
        branches = c.branches,
        functions = c.functions,
        statements = c.statements,
        actions = QUICK_ACTIONS,
        generated = summary.generated_at.to_rfc3339(),
    )
}

fn failure_section(summary: &TestSummary) -> String {
    let f = &summary.failures;
    let categories: Vec<String> = f
        .categories
        .iter()
        .filter(|c| c.estimated > 0)
        .map(|c| format!("- **{}**: ~{} failures", c.name, c.estimated))
        .collect();
    let areas: Vec<String> = f
        .categories
        .iter()
        .filter(|c| c.estimated > 0)
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. **{}**\n   - Category: {}\n   - Estimated Failures: ~{} ({}%)",
                i + 1,
                c.path,
                c.name,
                c.estimated,
                c.share_percent
            )
        })
        .collect();

    format!(
        "
### 🚨 FAILURE ANALYSIS

#### Failure Distribution
- **Total Failed Tests**: {}
- **Failed Test Suites**: {}
- **Success Rate**: {}%

#### Estimated Failure Categories
{}

#### Top Failure Areas
{}

#### 🔧 Quick Fix Commands
```bash
npm test -- --testPathPattern=unit
npm test -- --testPathPattern=integration
npm test -- --verbose --testPathPattern=components
npm test -- --onlyFailures
```
",
        f.total_failed,
        f.failed_suites,
        summary.metrics.success_rate,
        categories.join("\n"),
        areas.join("\n\n"),
    )
}

pub fn detailed_markdown(summary: &TestSummary) -> String {
    let r = &summary.results;
    let c = &summary.coverage;
    let m = &summary.metrics;
    let failures = if r.all_passed() {
        String::new()
    } else {
        failure_section(summary)
    };
    let recommendations: Vec<String> = summary
        .recommendations
        .iter()
        .map(|rec| format!("- {}", rec))
        .collect();

    format!(
        "# 🧪 COMPREHENSIVE TEST ANALYSIS

## 📊 Executive Summary
- **Overall Quality**: {overall}/100 {grade}
- **Test Status**: {test_status}
- **Coverage Status**: {coverage_status}

## 🎯 Test Results Breakdown
- **Total Test Suites**: {suites}
- **Passed Suites**: {passed_suites} ✅
- **Failed Suites**: {failed_suites} ❌
- **Total Tests**: {total}
- **Passed Tests**: {passed} ✅
- **Failed Tests**: {failed} ❌
- **Pending Tests**: {pending} ⏳
- **Execution Time**: {duration}ms

## 📈 Coverage Analysis
- **Lines**: {lines}% {lines_dot}
- **Branches**: {branches}% {branches_dot}
- **Functions**: {functions}% {functions_dot}
- **Statements**: {statements}% {statements_dot}

## 🎯 Quality Metrics
- **Success Rate**: {success}%
- **Coverage Score**: {coverage_score}%
- **Test Density**: {density}%
- **Overall Score**: {overall}/100
{failures}
## 📁 Data Sources
- **Test Results**: {source}
- **Generated**: {generated}

## 🔧 Recommendations
{recommendations}

---
*Enhanced Test Summary v{version}*
",
        overall = m.overall_score,
        grade = m.grade.label(),
        test_status = if r.all_passed() { "✅ PASSED" } else { "❌ FAILED" },
        coverage_status = Grade::for_score(c.lines).label(),
        suites = r.total_suites,
        passed_suites = r.passed_suites,
        failed_suites = r.failed_suites,
        total = r.total_tests,
        passed = r.passed_tests,
        failed = r.failed_tests,
        pending = r.pending_tests,
        duration = r.duration_ms,
        lines = c.lines,
        lines_dot = coverage_dot(c.lines),
        branches = c.branches,
        branches_dot = coverage_dot(c.branches),
        functions = c.functions,
        functions_dot = coverage_dot(c.functions),
        statements = c.statements,
        statements_dot = coverage_dot(c.statements),
        success = m.success_rate,
        coverage_score = m.coverage_score,
        density = m.test_density,
        failures = failures,
        source = match r.source {
            super::ResultSource::Jest => "`jest-results.json`",
            super::ResultSource::FileScan => "test files scanned from the project",
        },
        generated = summary.generated_at.to_rfc3339(),
        recommendations = recommendations.join("\n"),
        version = VERSION,
    )
}

const STYLE: &str = "body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f6f8fa; }
.container { max-width: 1200px; margin: 0 auto; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); overflow: hidden; }
.header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 30px; text-align: center; }
.content { padding: 30px; }
.metrics-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(250px, 1fr)); gap: 20px; margin: 30px 0; }
.metric-card { background: #f8f9fa; border-radius: 8px; padding: 20px; text-align: center; border-left: 4px solid #667eea; }
.metric-value { font-size: 2em; font-weight: bold; color: #667eea; }
.metric-label { color: #6c757d; margin-top: 5px; }
.status-badge { display: inline-block; padding: 8px 16px; border-radius: 20px; font-weight: bold; margin: 10px 0; }
.status-pass { background: #d4edda; color: #155724; }
.status-fail { background: #f8d7da; color: #721c24; }
.coverage-section { background: #e9ecef; border-radius: 8px; padding: 20px; margin: 20px 0; }
.coverage-bar { background: #dee2e6; border-radius: 10px; height: 20px; margin: 10px 0; overflow: hidden; }
.coverage-fill { height: 100%; background: linear-gradient(90deg, #28a745, #20c997); }
.failures { margin: 20px 0; padding: 20px; background: #fff3cd; border: 1px solid #ffeaa7; border-radius: 8px; }
.footer { background: #f8f9fa; padding: 20px; text-align: center; color: #6c757d; border-top: 1px solid #dee2e6; }
.quality-score { font-size: 3em; font-weight: bold; margin: 20px 0; text-align: center; }
.excellent { color: #28a745; }
.good { color: #ffc107; }
.needs-improvement { color: #dc3545; }";

fn metric_card(value: String, label: &str) -> String {
    format!(
        "<div class=\"metric-card\"><div class=\"metric-value\">{}</div><div class=\"metric-label\">{}</div></div>",
        value, label
    )
}

fn coverage_bar(label: &str, pct: u32) -> String {
    format!(
        "<div><strong>{}:</strong> {}%<div class=\"coverage-bar\"><div class=\"coverage-fill\" style=\"width: {}%\"></div></div></div>",
        label,
        pct,
        pct.min(100)
    )
}

pub fn html(summary: &TestSummary) -> String {
    let r = &summary.results;
    let c = &summary.coverage;
    let m = &summary.metrics;

    let cards = [
        metric_card(r.total_tests.to_string(), "Total Tests"),
        metric_card(r.passed_tests.to_string(), "Passed"),
        metric_card(r.failed_tests.to_string(), "Failed"),
        metric_card(format!("{}%", m.success_rate), "Success Rate"),
    ]
    .join("\n");
    let bars = [
        coverage_bar("Lines", c.lines),
        coverage_bar("Branches", c.branches),
        coverage_bar("Functions", c.functions),
        coverage_bar("Statements", c.statements),
    ]
    .join("\n");

    let failures = if r.all_passed() {
        String::new()
    } else {
        let items: String = summary
            .failures
            .categories
            .iter()
            .filter(|cat| cat.estimated > 0)
            .map(|cat| format!("<li><strong>{}:</strong> ~{} failures</li>", cat.name, cat.estimated))
            .collect();
        format!(
            "<div class=\"failures\"><h3>🚨 Failure Analysis</h3><p><strong>Total Failed Tests:</strong> {}</p><p><strong>Failed Test Suites:</strong> {}</p><h4>Estimated Failure Categories:</h4><ul>{}</ul></div>",
            r.failed_tests, r.failed_suites, items
        )
    };

    let badge = if r.all_passed() {
        "status-pass"
    } else {
        "status-fail"
    };

    format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
<title>🧪 Test Summary Report</title>
<style>
{style}
</style>
</head>
<body>
<div class=\"container\">
<div class=\"header\"><h1>🧪 Test Summary Report</h1><div>Enhanced Test Reporting v{version}</div></div>
<div class=\"content\">
<div class=\"quality-score {grade_class}\">{overall}/100</div>
<div style=\"text-align: center\"><span class=\"status-badge {badge}\">{status}</span></div>
<div class=\"metrics-grid\">
{cards}
</div>
<div class=\"coverage-section\">
<h3>📊 Code Coverage</h3>
{bars}
</div>
{failures}
<h3>🔧 Quick Actions</h3>
<pre>{actions}</pre>
</div>
<div class=\"footer\">Generated on {generated} | Enhanced Test Reporting v{version}</div>
</div>
</body>
</html>
",
        style = STYLE,
        version = VERSION,
        grade_class = m.grade.css_class(),
        overall = m.overall_score,
        badge = badge,
        status = status_line(summary),
        cards = cards,
        bars = bars,
        failures = failures,
        actions = QUICK_ACTIONS,
        generated = summary.generated_at.to_rfc3339(),
    )
}

pub fn json_data(summary: &TestSummary) -> Value {
    json!({
        "metadata": {
            "generated": summary.generated_at.to_rfc3339(),
            "version": VERSION,
            "generator": "tuinbeheer test-summary",
        },
        "testResults": summary.results,
        "coverageData": summary.coverage,
        "qualityMetrics": summary.metrics,
        "failureAnalysis": summary.failures,
        "recommendations": summary.recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_summary::{Coverage, ResultSource, TestResults};
    use chrono::{TimeZone, Utc};

    fn summary(failed: u64) -> TestSummary {
        let results = TestResults {
            total_tests: 120,
            passed_tests: 120 - failed,
            failed_tests: failed,
            pending_tests: 0,
            total_suites: 12,
            passed_suites: if failed > 0 { 11 } else { 12 },
            failed_suites: u64::from(failed > 0),
            duration_ms: 4321,
            source: ResultSource::Jest,
        };
        let coverage = Coverage {
            lines: 85,
            branches: 62,
            functions: 40,
            statements: 84,
        };
        TestSummary::new(
            results,
            coverage,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_summary_markdown_passing() {
        let md = summary_markdown(&summary(0));
        assert!(md.starts_with("# 🧪 TEST EXECUTION SUMMARY"));
        assert!(md.contains("**✅ ALL TESTS PASSED**"));
        assert!(md.contains("- **Total Tests**: 120"));
        assert!(md.contains("- **Duration**: 4321ms"));
        assert!(md.contains("- **Branches**: 62%"));
        assert!(md.contains("*Generated on 2026-03-01T12:00:00+00:00*"));
    }

    #[test]
    fn test_detailed_markdown_includes_failures_only_when_failing() {
        let passing = detailed_markdown(&summary(0));
        assert!(!passing.contains("FAILURE ANALYSIS"));
        assert!(passing.contains("- **Lines**: 85% 🟢"));
        assert!(passing.contains("- **Branches**: 62% 🟡"));
        assert!(passing.contains("- **Functions**: 40% 🔴"));

        let failing = detailed_markdown(&summary(10));
        assert!(failing.contains("### 🚨 FAILURE ANALYSIS"));
        assert!(failing.contains("- **Unit**: ~4 failures"));
        assert!(failing.contains("- **Test Status**: ❌ FAILED"));
        assert!(failing.contains("- **Investigate test suite failures**"));
    }

    #[test]
    fn test_html_report() {
        let html = html(&summary(10));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("status-fail"));
        assert!(html.contains("<li><strong>Integration:</strong> ~3 failures</li>"));
        assert!(html.contains("style=\"width: 85%\""));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_json_data_shape() {
        let data = json_data(&summary(0));
        assert_eq!(data["metadata"]["version"], VERSION);
        assert_eq!(data["testResults"]["totalTests"], 120);
        assert_eq!(data["coverageData"]["lines"], 85);
        // 0.4 * 100 + 0.4 * 68 + 0.2 * 12 = 70
        assert_eq!(data["qualityMetrics"]["overallScore"], 70);
        assert_eq!(data["qualityMetrics"]["grade"], "good");
        assert!(data["recommendations"].is_array());
    }
}
