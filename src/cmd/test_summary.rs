//! Test report generation — `tuinbeheer test-summary`.

use anyhow::Result;
use console::style;
use std::path::Path;

use tuinbeheer::config::TuinConfig;
use tuinbeheer::tools::test_summary::{Grade, TestSummary, write_reports};
use tuinbeheer::ui::icons::{CHECK, CROSS, FILE, TEST};

pub fn cmd_test_summary(config: &TuinConfig, output: Option<&Path>) -> Result<()> {
    let section = &config.toml.test_summary;
    let summary = TestSummary::collect(&config.project_dir, section)?;
    let out_dir = match output {
        Some(dir) => config.resolve(dir),
        None => config.resolve(&section.results_dir),
    };
    let written = write_reports(&summary, &out_dir)?;

    let r = &summary.results;
    let m = &summary.metrics;
    println!("{}{}", TEST, style("Test Summary").bold());
    let status = if r.all_passed() { CHECK } else { CROSS };
    println!(
        "{}{} tests: {} passed, {} failed, {} pending",
        status, r.total_tests, r.passed_tests, r.failed_tests, r.pending_tests
    );
    let score = format!("{}/100 {}", m.overall_score, m.grade.label());
    let score = match m.grade {
        Grade::Excellent => style(score).green(),
        Grade::Good => style(score).yellow(),
        Grade::NeedsImprovement => style(score).red(),
    };
    println!("Quality score: {}", score);
    for path in written {
        println!("  {}{}", FILE, path.display());
    }
    Ok(())
}
