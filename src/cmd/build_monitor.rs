//! Build monitor commands — `tuinbeheer build-monitor`.

use anyhow::{Context, Result, bail};
use console::style;

use super::super::BuildMonitorCommands;
use tuinbeheer::config::TuinConfig;
use tuinbeheer::errors::ToolError;
use tuinbeheer::tools::build_monitor::parser::{BuildError, parse_build_output};
use tuinbeheer::tools::build_monitor::{BuildMonitor, BuildReport, MonitorConfig};
use tuinbeheer::ui::icons::{CHECK, CROSS, WRENCH};
use tuinbeheer::ui::{finish_spinner, spinner};

fn print_errors(errors: &[BuildError]) {
    for error in errors {
        println!(
            "  {}:{}:{} {} {}",
            error.file,
            error.line,
            error.column,
            style(format!("[{:?}]", error.kind)).dim(),
            error.message
        );
    }
}

fn print_report(report: &BuildReport) {
    if report.success {
        println!(
            "{}Build succeeded after {} attempt(s), {} fix(es) applied",
            CHECK, report.attempts, report.fixes_applied
        );
    } else {
        println!(
            "{}Build failed after {} attempt(s), {} fix(es) applied",
            CROSS, report.attempts, report.fixes_applied
        );
        print_errors(&report.errors);
    }
}

pub async fn cmd_build_monitor(config: &TuinConfig, command: BuildMonitorCommands) -> Result<()> {
    match command {
        BuildMonitorCommands::Analyze => {
            let monitor = BuildMonitor::new(MonitorConfig::from_config(config));
            println!(
                "{}Monitoring `{}` (up to {} attempts)",
                WRENCH,
                monitor.config().command,
                monitor.config().max_attempts
            );
            let bar = spinner("Building...");
            let report = monitor.run().await;
            finish_spinner(&bar, "");
            let report = report?;
            print_report(&report);
            if !report.success {
                bail!("Build failed after {} attempts", report.attempts);
            }
        }
        BuildMonitorCommands::Webhook { payload } => {
            let content =
                std::fs::read_to_string(&payload).map_err(|source| ToolError::ReadFailed {
                    path: payload.clone(),
                    source,
                })?;
            let payload: serde_json::Value =
                serde_json::from_str(&content).context("Webhook payload is not valid JSON")?;
            let monitor = BuildMonitor::new(MonitorConfig::from_config(config));
            match monitor.handle_webhook(payload).await? {
                Some(report) => print_report(&report),
                None => println!("Event ignored: not a failed deployment"),
            }
        }
        BuildMonitorCommands::Parse { log, json } => {
            let content = std::fs::read_to_string(&log).map_err(|source| ToolError::ReadFailed {
                path: log.clone(),
                source,
            })?;
            let errors = parse_build_output(&content);
            if json {
                println!("{}", serde_json::to_string_pretty(&errors)?);
            } else if errors.is_empty() {
                println!("{}No build errors found", CHECK);
            } else {
                println!("{} build error(s):", errors.len());
                print_errors(&errors);
            }
        }
    }
    Ok(())
}
