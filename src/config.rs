//! Unified configuration for tuinbeheer.
//!
//! Settings are read from `tuin.toml` in the project directory and layered
//! as file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! db_path = ".tuin/tuinbeheer.db"
//! dev_mode = false
//!
//! [pagination]
//! default_page_size = 10
//! max_page_size = 100
//!
//! [security]
//! max_input_length = 1000
//!
//! [webhook]
//! secret = "..."
//!
//! [logging]
//! level = "info"
//! json = false
//! file = ".tuin/logs/tuinbeheer.log"
//! audit_file = ".tuin/audit.jsonl"
//!
//! [review]
//! model = "gpt-4o-mini"
//! max_input_chars = 32000
//! max_file_bytes = 200000
//! fail_on_high = true
//!
//! [build_monitor]
//! command = "npm run build"
//! max_attempts = 3
//! timeout_secs = 300
//! safety_level = "moderate"
//!
//! [auto_fix]
//! branch_prefix = "auto-fix"
//! max_line_length = 120
//!
//! [test_summary]
//! results_dir = "test-results"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the project directory.
pub const CONFIG_FILE: &str = "tuin.toml";

/// How far the build monitor may go when rewriting sources.
///
/// | Level      | Rules admitted            |
/// |------------|---------------------------|
/// | `Safe`     | safe                      |
/// | `Moderate` | safe, moderate (default)  |
/// | `Risky`    | all                       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Safe,
    #[default]
    Moderate,
    Risky,
}

impl std::fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyLevel::Safe => write!(f, "safe"),
            SafetyLevel::Moderate => write!(f, "moderate"),
            SafetyLevel::Risky => write!(f, "risky"),
        }
    }
}

impl std::str::FromStr for SafetyLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(SafetyLevel::Safe),
            "moderate" => Ok(SafetyLevel::Moderate),
            "risky" => Ok(SafetyLevel::Risky),
            _ => anyhow::bail!(
                "Invalid safety level '{}'. Valid values: safe, moderate, risky",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Permissive CORS and bind on all interfaces
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".tuin/tuinbeheer.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSection {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Longest accepted free-text input, in characters
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
}

fn default_max_input_length() -> usize {
    1000
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            max_input_length: default_max_input_length(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSection {
    /// Shared HMAC secret for the build webhook
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Daily-rolled log file in addition to stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// JSON-lines audit trail
    #[serde(default)]
    pub audit_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
            audit_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSection {
    #[serde(default = "default_review_model")]
    pub model: String,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_true")]
    pub fail_on_high: bool,
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
}

fn default_review_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_input_chars() -> usize {
    32_000
}

fn default_max_file_bytes() -> u64 {
    200_000
}

fn default_true() -> bool {
    true
}

fn default_report_file() -> PathBuf {
    PathBuf::from("ai-security-review.md")
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            model: default_review_model(),
            max_input_chars: default_max_input_chars(),
            max_file_bytes: default_max_file_bytes(),
            fail_on_high: true,
            report_file: default_report_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMonitorSection {
    #[serde(default = "default_build_command")]
    pub command: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_fixes_per_pass")]
    pub max_fixes_per_pass: usize,
    #[serde(default)]
    pub safety_level: SafetyLevel,
    #[serde(default = "default_install_command")]
    pub install_command: String,
    #[serde(default = "default_true")]
    pub auto_commit: bool,
    #[serde(default = "default_true")]
    pub push: bool,
    /// Receives a JSON failure notification when set
    #[serde(default)]
    pub notify_url: Option<String>,
}

fn default_build_command() -> String {
    "npm run build".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_max_fixes_per_pass() -> usize {
    10
}

fn default_install_command() -> String {
    "npm install".to_string()
}

impl Default for BuildMonitorSection {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_fixes_per_pass: default_max_fixes_per_pass(),
            safety_level: SafetyLevel::default(),
            install_command: default_install_command(),
            auto_commit: true,
            push: true,
            notify_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoFixSection {
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_pr_dir")]
    pub pr_dir: PathBuf,
    #[serde(default = "default_test_output_dir")]
    pub test_output_dir: PathBuf,
    #[serde(default = "default_history_months")]
    pub history_months: u32,
}

fn default_branch_prefix() -> String {
    "auto-fix".to_string()
}

fn default_max_line_length() -> usize {
    120
}

fn default_pr_dir() -> PathBuf {
    PathBuf::from(".auto-fix/pull-requests")
}

fn default_test_output_dir() -> PathBuf {
    PathBuf::from("ai-pipeline-tests")
}

fn default_history_months() -> u32 {
    6
}

impl Default for AutoFixSection {
    fn default() -> Self {
        Self {
            branch_prefix: default_branch_prefix(),
            max_line_length: default_max_line_length(),
            pr_dir: default_pr_dir(),
            test_output_dir: default_test_output_dir(),
            history_months: default_history_months(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummarySection {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_coverage_file")]
    pub coverage_file: PathBuf,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("test-results")
}

fn default_coverage_file() -> PathBuf {
    PathBuf::from("coverage/coverage-summary.json")
}

impl Default for TestSummarySection {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            coverage_file: default_coverage_file(),
        }
    }
}

/// The complete tuin.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuinToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub pagination: PaginationSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub webhook: WebhookSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub build_monitor: BuildMonitorSection,
    #[serde(default)]
    pub auto_fix: AutoFixSection,
    #[serde(default)]
    pub test_summary: TestSummarySection,
}

impl TuinToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse tuin.toml")
    }

    /// Returns the default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize tuin.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. Unparseable values are reported, not ignored.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = get("TUIN_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid TUIN_PORT '{}'", port))?;
        }
        if let Some(path) = get("TUIN_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(secret) = get("VERCEL_WEBHOOK_SECRET") {
            self.webhook.secret = Some(secret);
        }
        if let Some(json) = get("TUIN_LOG_JSON") {
            self.logging.json = json == "true" || json == "1";
        }
        if let Some(fail) = get("FAIL_ON_HIGH") {
            self.review.fail_on_high = fail != "false";
        }
        Ok(())
    }

    /// Problems worth surfacing before starting the service.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.pagination.max_page_size == 0 {
            warnings.push("pagination.max_page_size must be greater than 0".to_string());
        }
        if self.pagination.default_page_size > self.pagination.max_page_size {
            warnings.push(format!(
                "pagination.default_page_size ({}) exceeds max_page_size ({})",
                self.pagination.default_page_size, self.pagination.max_page_size
            ));
        }
        if self.webhook.secret.as_deref().is_none_or(str::is_empty) {
            warnings.push(
                "webhook.secret is not set; the build webhook will reject all deliveries"
                    .to_string(),
            );
        }
        if self.build_monitor.max_attempts == 0 {
            warnings.push("build_monitor.max_attempts must be at least 1".to_string());
        }
        if self.review.max_input_chars == 0 {
            warnings.push("review.max_input_chars must be greater than 0".to_string());
        }
        warnings
    }
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct TuinConfig {
    pub project_dir: PathBuf,
    pub config_path: PathBuf,
    pub toml: TuinToml,
    pub verbose: bool,
}

impl TuinConfig {
    /// Load `tuin.toml` (or `config_path`) and apply environment overrides.
    pub fn load(project_dir: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => project_dir.join(CONFIG_FILE),
        };
        let mut toml = TuinToml::load_or_default(&config_path)?;
        toml.apply_env()?;
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config_path,
            toml,
            verbose: false,
        })
    }

    /// Resolve a configured path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.toml.server.db_path)
    }
}
