use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password};
use std::path::PathBuf;

/// Application directory name under the platform data dir
const APP_NAME: &str = "careerpath";

/// Store file name
const STORE_FILE: &str = "session.sqlite3";

/// Default backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// CareerPath command-line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Backend API base URL
    #[arg(short = 'u', long, env = "CAREERPATH_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Path to the credential store (SQLite)
    #[arg(short = 's', long, env = "CAREERPATH_STORE")]
    pub store: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show the local session state without contacting the backend
    Status,
    /// Force an access token refresh
    Refresh,
    /// Confirm an email address with a verification token
    VerifyEmail { token: String },
    /// Send a new verification email
    RequestVerification,
    /// List roadmaps, or show one
    Roadmaps {
        #[arg(long)]
        id: Option<i64>,
    },
    /// Generate a roadmap for a career goal
    Generate { goal: String },
    /// Create an empty roadmap
    CreateRoadmap {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Set a skill's status (pending, in_progress, completed)
    SkillStatus { skill_id: i64, status: String },
    /// Replace a skill's details
    UpdateSkill {
        skill_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        hours: i64,
        #[arg(long)]
        difficulty: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a skill from its roadmap
    DeleteSkill { skill_id: i64 },
    /// Show dashboard statistics
    Stats,
    /// Show goal progress
    Goals,
    /// Show suggested topics and skills
    Recommendations,
    /// Ask the AI assistant a question
    Chat { message: String },
    /// Delete the account and sign out
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub api_url: String,

    // Credential store
    pub store_path: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Build a config from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let store_path = match args.store {
            Some(path) => expand_tilde(&path),
            None => default_store_path()?,
        };

        Ok(Config {
            api_url: args.api_url.trim_end_matches('/').to_string(),
            store_path,
            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            http_request_timeout: args.http_timeout,
            log_level: args.log_level,
            log_json: args.log_json,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!(
                "CAREERPATH_API_URL must be an absolute http(s) URL: {}",
                self.api_url
            );
        }
        if self.http_request_timeout == 0 || self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }
        Ok(())
    }
}

/// `<data_dir>/careerpath/session.sqlite3`
fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not find data directory")?;
    Ok(data_dir.join(APP_NAME).join(STORE_FILE))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// === Interactive prompts ===

/// Use `value` if given, otherwise ask for it
pub fn prompt_if_missing(value: Option<String>, prompt: &str) -> Result<String> {
    let value = match value {
        Some(v) => v,
        None => Input::new()
            .with_prompt(prompt)
            .interact_text()
            .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?,
    };

    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", prompt);
    }
    Ok(value.trim().to_string())
}

/// Read a password without echo. `confirm` asks for it twice.
pub fn prompt_password(confirm: bool) -> Result<String> {
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    let password = prompt.interact().context("Failed to read password")?;

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

/// Ask a yes/no question, defaulting to no
pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}
