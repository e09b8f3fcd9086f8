use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tuinbeheer::config::TuinConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "tuinbeheer")]
#[command(version, about = "Garden management service with build, review and auto-fix tooling")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to tuin.toml (defaults to <project-dir>/tuin.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the garden web service
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Permissive CORS for a local frontend dev server
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and apply the schema
    InitDb,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Run the build, parse failures and apply automated fixes
    BuildMonitor {
        #[command(subcommand)]
        command: BuildMonitorCommands,
    },
    /// Review the current pull request with the model and post the findings
    SecurityReview,
    /// Aggregate Jest results and coverage into reports
    TestSummary {
        /// Output directory (defaults to the configured results directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scan sources for known bad patterns and fix them
    AutoFix {
        #[command(subcommand)]
        command: AutoFixCommands,
    },
    /// Show, validate or create tuin.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// Create a user and print the temporary password
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "user")]
        role: String,
        /// Garden ids the user may access (repeatable)
        #[arg(long = "garden")]
        gardens: Vec<i64>,
    },
    /// List active users
    List,
}

#[derive(Subcommand, Clone)]
pub enum BuildMonitorCommands {
    /// Build, fix and rebuild until the build passes or attempts run out
    Analyze,
    /// Handle a deployment webhook payload read from a file
    Webhook {
        #[arg(long)]
        payload: PathBuf,
    },
    /// Parse a build log and list the errors without fixing anything
    Parse {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum AutoFixCommands {
    /// List issues and proposed fixes
    Scan {
        path: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Apply fixes that are safe to apply automatically
    Apply {
        path: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Apply on a new branch and commit
        #[arg(long)]
        branch: bool,
    },
    /// Write Jest suites that guard against the found issues
    GenerateTests {
        path: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show how often a file changed recently
    History { file: PathBuf },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default tuin.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if let Err(e) = dotenvy::from_path(project_dir.join(".env"))
        && !e.not_found()
    {
        eprintln!("Failed to load .env: {}", e);
    }

    let mut config = TuinConfig::load(&project_dir, cli.config.as_deref())?;
    config.verbose = cli.verbose;
    let _guard = tuinbeheer::telemetry::init_tracing(&config.toml.logging, cli.verbose)?;

    match &cli.command {
        Commands::Serve { host, port, dev } => {
            cmd::cmd_serve(&config, host.clone(), *port, *dev).await?
        }
        Commands::InitDb => cmd::cmd_init_db(&config)?,
        Commands::User { command } => cmd::cmd_user(&config, command.clone()).await?,
        Commands::BuildMonitor { command } => {
            cmd::cmd_build_monitor(&config, command.clone()).await?
        }
        Commands::SecurityReview => cmd::cmd_security_review(&config).await?,
        Commands::TestSummary { output } => cmd::cmd_test_summary(&config, output.as_deref())?,
        Commands::AutoFix { command } => cmd::cmd_auto_fix(&config, command.clone())?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
