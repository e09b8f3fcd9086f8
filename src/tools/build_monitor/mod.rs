//! Build monitor: runs the project build, parses failures, applies the fix
//! rules allowed at the configured safety level and retries.
//!
//! Triggered from the CLI (`tuinbeheer build-monitor analyze`) or by a
//! `deployment.error` delivery on the build webhook.

pub mod fixes;
pub mod parser;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{SafetyLevel, TuinConfig};
use crate::errors::ToolError;
use crate::tools::git::{self, GitRepo};
pub use fixes::{FixAction, FixRule, default_rules};
pub use parser::{BuildError, ErrorKind, Severity, parse_build_output};

/// Settings for one monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub project_dir: PathBuf,
    pub command: String,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub max_fixes_per_pass: usize,
    pub safety_level: SafetyLevel,
    pub install_command: String,
    pub auto_commit: bool,
    pub push: bool,
    pub notify_url: Option<String>,
}

impl MonitorConfig {
    pub fn from_config(config: &TuinConfig) -> Self {
        let section = &config.toml.build_monitor;
        Self {
            project_dir: config.project_dir.clone(),
            command: section.command.clone(),
            max_attempts: section.max_attempts.max(1),
            timeout: Duration::from_secs(section.timeout_secs),
            retry_delay: Duration::from_secs(section.retry_delay_secs),
            max_fixes_per_pass: section.max_fixes_per_pass,
            safety_level: section.safety_level,
            install_command: section.install_command.clone(),
            auto_commit: section.auto_commit,
            push: section.push,
            notify_url: section.notify_url.clone(),
        }
    }
}

/// Outcome of a monitored build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub success: bool,
    pub attempts: u32,
    /// Errors from the last failed attempt
    pub errors: Vec<BuildError>,
    pub fixes_applied: usize,
}

/// Body POSTed to `notify_url` when automated fixing gives up.
#[derive(Debug, Clone, Serialize)]
pub struct FailureNotification {
    pub deployment_id: String,
    pub project_id: String,
    pub deployment_url: Option<String>,
    pub attempts: u32,
    pub errors: Vec<BuildError>,
}

struct BuildRun {
    success: bool,
    output: String,
}

#[derive(Clone)]
pub struct BuildMonitor {
    config: Arc<MonitorConfig>,
    rules: Arc<Vec<FixRule>>,
    http: reqwest::Client,
}

impl BuildMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config: Arc::new(config),
            rules: Arc::new(default_rules()),
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Build, fix and retry until the build passes or nothing more can be done.
    pub async fn run(&self) -> Result<BuildReport> {
        let max_attempts = self.config.max_attempts;
        let mut report = BuildReport {
            success: false,
            attempts: 0,
            errors: Vec::new(),
            fixes_applied: 0,
        };

        tracing::info!(command = %self.config.command, max_attempts, "Starting build analysis");

        while report.attempts < max_attempts {
            report.attempts += 1;
            tracing::info!(attempt = report.attempts, max_attempts, "Build attempt");

            let run = self.run_build().await?;
            if run.success {
                tracing::info!(attempt = report.attempts, "Build succeeded");
                report.success = true;
                report.errors.clear();
                if report.attempts > 1 && self.config.auto_commit {
                    let message = format!(
                        "Automated build fix - attempt {} successful",
                        report.attempts
                    );
                    if let Err(e) = self.commit_fixes(&message).await {
                        tracing::warn!(error = %e, "Failed to commit automated fixes");
                    }
                }
                return Ok(report);
            }

            tracing::warn!(attempt = report.attempts, "Build failed");
            let errors = parse_build_output(&run.output);
            if errors.is_empty() {
                let preview: String = run.output.chars().take(1000).collect();
                tracing::warn!(output = %preview, "No parseable errors in build output");
                break;
            }

            let applied = self.auto_fix(&errors).await;
            report.errors = errors;
            report.fixes_applied += applied;
            if applied == 0 {
                tracing::warn!("No applicable fixes found");
                break;
            }

            if report.attempts < max_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        tracing::error!(attempts = report.attempts, "Build still failing");
        Ok(report)
    }

    async fn run_build(&self) -> Result<BuildRun> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.config.command)
            .current_dir(&self.config.project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn build command: {}", self.config.command))?;

        match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.context("Failed to wait for build command")?;
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(BuildRun {
                    success: output.status.success(),
                    output: combined,
                })
            }
            Err(_) => {
                let err = ToolError::BuildTimeout {
                    seconds: self.config.timeout.as_secs(),
                };
                tracing::warn!(error = %err, "Build attempt abandoned");
                Ok(BuildRun {
                    success: false,
                    output: String::new(),
                })
            }
        }
    }

    /// Apply every allowed rule to the first `max_fixes_per_pass` errors.
    /// Returns the number of fixes that changed something.
    pub async fn auto_fix(&self, errors: &[BuildError]) -> usize {
        let mut applied = 0;
        tracing::info!(count = errors.len(), "Analyzing build errors");

        for error in errors.iter().take(self.config.max_fixes_per_pass) {
            let rules = fixes::applicable_rules(&self.rules, error, self.config.safety_level);
            for rule in rules {
                let result = if rule.action.edits_source() {
                    self.fix_source(rule, error)
                } else {
                    self.fix_project(rule, error).await
                };
                match result {
                    Ok(true) => {
                        tracing::info!(rule = rule.id, build_error = %error.message, "Applied fix: {}", rule.description);
                        applied += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(rule = rule.id, error = %e, "Failed to apply fix");
                    }
                }
            }
        }

        tracing::info!(applied, "Automated fixes applied");
        applied
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.project_dir.join(path)
        }
    }

    fn fix_source(&self, rule: &FixRule, error: &BuildError) -> Result<bool> {
        if error.file.is_empty() {
            return Ok(false);
        }
        let path = self.resolve(&error.file);
        let content = std::fs::read_to_string(&path).map_err(|source| ToolError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let fixed = rule.rewrite(error, &content);
        if fixed == content {
            return Ok(false);
        }
        std::fs::write(&path, fixed).map_err(|source| ToolError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        Ok(true)
    }

    async fn fix_project(&self, rule: &FixRule, error: &BuildError) -> Result<bool> {
        match rule.action {
            FixAction::InstallPackage => {
                let Some(package) = fixes::missing_module(&error.message) else {
                    return Ok(false);
                };
                if !fixes::is_safe_package(&package) {
                    tracing::info!(package = %package, "Package not on the safe list; skipping install");
                    return Ok(false);
                }
                self.install_package(&package).await?;
                Ok(true)
            }
            FixAction::CleanNextConfig => self.clean_next_config(),
            _ => Ok(false),
        }
    }

    async fn install_package(&self, package: &str) -> Result<()> {
        let command = format!("{} {}", self.config.install_command, package);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.config.project_dir)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", command))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} failed: {}",
                command,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        tracing::info!(package, "Installed missing package");
        Ok(())
    }

    fn clean_next_config(&self) -> Result<bool> {
        for name in ["next.config.mjs", "next.config.js"] {
            let path = self.config.project_dir.join(name);
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|source| {
                ToolError::ReadFailed {
                    path: path.clone(),
                    source,
                }
            })?;
            let cleaned = fixes::clean_next_config(&content);
            if cleaned == content {
                return Ok(false);
            }
            std::fs::write(&path, cleaned).map_err(|source| ToolError::WriteFailed {
                path: path.clone(),
                source,
            })?;
            tracing::info!(file = name, "Fixed Next.js config issues");
            return Ok(true);
        }
        Ok(false)
    }

    async fn commit_fixes(&self, message: &str) -> Result<()> {
        let full = format!("Banking Standards: {} - DNB compliant automated fixes", message);
        // git2::Repository is not Sync; it must not live across the push await
        let workdir = {
            let git = GitRepo::open(&self.config.project_dir)?;
            if git.commit_all(&full)?.is_none() {
                return Ok(());
            }
            git.workdir().to_path_buf()
        };
        if self.config.push {
            git::push(&workdir).await?;
            tracing::info!("Pushed automated fixes");
        }
        Ok(())
    }

    /// React to a deployment webhook. Only `deployment.error` triggers analysis.
    pub async fn handle_webhook(&self, payload: Value) -> Result<Option<BuildReport>> {
        if payload.get("type").and_then(Value::as_str) != Some("deployment.error") {
            return Ok(None);
        }
        let deployment_id = pointer_str(&payload, "/payload/deployment/id");
        let project_id = pointer_str(&payload, "/payload/project/id");
        tracing::warn!(deployment_id = %deployment_id, project_id = %project_id, "Deployment error detected");

        let report = self.run().await?;
        if report.success {
            tracing::info!("Automated fix successful; the next deployment should pass");
        } else {
            tracing::error!("Automated fix failed; manual intervention required");
            let notification = FailureNotification {
                deployment_id,
                project_id,
                deployment_url: payload
                    .pointer("/payload/links/deployment")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                attempts: report.attempts,
                errors: report.errors.clone(),
            };
            self.send_failure_notification(&notification).await;
        }
        Ok(Some(report))
    }

    async fn send_failure_notification(&self, notification: &FailureNotification) {
        tracing::warn!(
            deployment_id = %notification.deployment_id,
            url = ?notification.deployment_url,
            errors = notification.errors.len(),
            "Sending failure notification"
        );
        let Some(url) = self.config.notify_url.as_deref() else {
            return;
        };
        match self.http.post(url).json(notification).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => tracing::warn!(status = %resp.status(), "Failure notification rejected"),
            Err(e) => tracing::warn!(error = %e, "Failed to send failure notification"),
        }
    }
}

fn pointer_str(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}
