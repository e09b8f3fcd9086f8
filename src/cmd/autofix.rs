//! Pattern-based code fixing — `tuinbeheer auto-fix`.

use anyhow::Result;
use chrono::Utc;
use console::style;
use std::path::{Path, PathBuf};

use super::super::AutoFixCommands;
use tuinbeheer::config::TuinConfig;
use tuinbeheer::tools::autofix::fixer::Fix;
use tuinbeheer::tools::autofix::rules::Severity;
use tuinbeheer::tools::autofix::{ApplyReport, AutoFixer, FixPlan};
use tuinbeheer::ui::icons::{BRANCH, CHECK, CROSS, FILE, WARN, WRENCH};
use tuinbeheer::ui::{finish_spinner, spinner};

fn target(fixer: &AutoFixer, config: &TuinConfig, path: Option<PathBuf>) -> PathBuf {
    match path {
        Some(path) => config.resolve(&path),
        None => fixer.root().to_path_buf(),
    }
}

fn relative<'a>(path: &'a Path, root: &Path) -> std::path::Display<'a> {
    path.strip_prefix(root).unwrap_or(path).display()
}

fn severity_label(severity: Severity) -> console::StyledObject<String> {
    let label = severity.to_string();
    match severity {
        Severity::Critical => style(label).red().bold(),
        Severity::High => style(label).red(),
        Severity::Medium => style(label).yellow(),
        Severity::Low => style(label).dim(),
    }
}

fn scan(fixer: &AutoFixer, target: &Path) -> Result<FixPlan> {
    let bar = spinner(format!("Scanning {}", target.display()));
    let plan = fixer.scan(target);
    finish_spinner(&bar, "");
    plan
}

fn print_plan(plan: &FixPlan, root: &Path) {
    if plan.issues.is_empty() {
        println!("{}No issues found", CHECK);
        return;
    }
    for issue in &plan.issues {
        println!(
            "{}:{}:{} {} {} {}",
            relative(&issue.file, root),
            issue.line,
            issue.column,
            severity_label(issue.severity),
            style(format!("[{}]", issue.rule_id)).dim(),
            issue.message
        );
    }
    let auto = plan.fixes.iter().filter(|f| f.auto_apply).count();
    println!();
    println!(
        "{} issue(s), {} fixable, {} safe to apply automatically",
        plan.issues.len(),
        plan.fixes.len(),
        auto
    );
}

fn print_fix(fix: &Fix, root: &Path) {
    println!(
        "  {}:{} {}",
        relative(&fix.file, root),
        fix.line,
        style(fix.description).bold()
    );
    println!("    {} {}", style("-").red(), fix.before.trim());
    println!("    {} {}", style("+").green(), fix.after.trim());
}

fn print_report(report: &ApplyReport, root: &Path) {
    if let Some(branch) = &report.branch {
        println!("{}Branch {}", BRANCH, style(branch).cyan());
    }
    println!("{}Applied {} fix(es)", CHECK, report.applied.len());
    for file in &report.files {
        println!("  {}{}", FILE, relative(file, root));
    }
    for rejected in &report.rejected {
        let reasons: Vec<&str> = rejected
            .validation
            .failures()
            .map(|r| r.message.as_str())
            .collect();
        println!(
            "{}Rejected {}:{} ({})",
            CROSS,
            relative(&rejected.fix.file, root),
            rejected.fix.line,
            reasons.join("; ")
        );
    }
    if !report.skipped.is_empty() {
        println!(
            "{}{} fix(es) share a line with an applied fix; run again to apply them",
            WARN,
            report.skipped.len()
        );
    }
    if let Some(commit) = &report.commit {
        println!("Committed {}", &commit[..commit.len().min(8)]);
    }
    if let Some(pr) = &report.pull_request {
        println!("Pull request template: {}", relative(pr, root));
    }
}

pub fn cmd_auto_fix(config: &TuinConfig, command: AutoFixCommands) -> Result<()> {
    let fixer = AutoFixer::new(&config.project_dir, config.toml.auto_fix.clone());
    let root = fixer.root().to_path_buf();

    match command {
        AutoFixCommands::Scan { path, json } => {
            let target = target(&fixer, config, path);
            let plan = scan(&fixer, &target)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan, &root);
            }
        }
        AutoFixCommands::Apply { path, yes, branch } => {
            use dialoguer::Confirm;

            let target = target(&fixer, config, path);
            let plan = scan(&fixer, &target)?;
            let fixes = plan.auto_fixes();
            if fixes.is_empty() {
                println!("{}Nothing to fix automatically", CHECK);
                return Ok(());
            }

            println!("{}{} fix(es) to apply:", WRENCH, fixes.len());
            for fix in &fixes {
                print_fix(fix, &root);
            }

            if !yes {
                let confirm = Confirm::new()
                    .with_prompt("Apply these fixes?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);
                if !confirm {
                    println!("Cancelled");
                    return Ok(());
                }
            }

            let report = if branch {
                fixer.apply_on_branch(&fixes, Utc::now())?
            } else {
                fixer.apply(&fixes)?
            };
            print_report(&report, &root);
        }
        AutoFixCommands::GenerateTests { path, output } => {
            let target = target(&fixer, config, path);
            let plan = scan(&fixer, &target)?;
            let output = output.map(|o| config.resolve(&o));
            let suites = fixer.generate_tests(&plan.issues, output.as_deref(), Utc::now())?;
            if suites.is_empty() {
                println!("No testable issues found");
            } else {
                println!("{}Generated {} test suite(s)", CHECK, suites.len());
                for suite in suites {
                    println!(
                        "  {}{} ({} test(s))",
                        FILE,
                        relative(&suite.path, &root),
                        suite.tests.len()
                    );
                }
            }
        }
        AutoFixCommands::History { file } => {
            let analysis = fixer.history(&config.resolve(&file), Utc::now())?;
            println!("{}", style(relative(&file, &root)).bold());
            println!("  commits:      {}", analysis.commit_count);
            println!("  branch:       {}", analysis.branch);
            println!("  contributors: {}", analysis.contributors.join(", "));
            println!("  changes/month: {:.2}", analysis.change_frequency);
        }
    }
    Ok(())
}
