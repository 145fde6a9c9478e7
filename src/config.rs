//! Runtime configuration: command line flags with environment fallbacks.
//! `.env` is loaded by `main` before parsing, so both sources feed clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

#[derive(Debug, Clone, Parser)]
#[command(name = "devbills", version, about = "Terminal client for the DevBills finance tracker")]
pub struct Config {
    /// Base URL of the DevBills REST backend
    #[arg(long, env = "DEVBILLS_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: Url,

    /// Web API key of the identity provider project
    #[arg(long, env = "FIREBASE_API_KEY", hide_env_values = true)]
    pub firebase_api_key: Option<String>,

    /// Identity toolkit endpoint used for password sign-in
    #[arg(long, env = "DEVBILLS_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: Url,

    /// Secure token endpoint used to refresh sessions
    #[arg(long, env = "DEVBILLS_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: Url,

    /// Where the signed-in session is kept between runs
    #[arg(long, env = "DEVBILLS_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Do not store the session on disk
    #[arg(long)]
    pub no_persist: bool,

    /// Log file (stdout belongs to the terminal UI)
    #[arg(long, env = "DEVBILLS_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// HTTP timeout in seconds for backend and identity requests
    #[arg(long, env = "DEVBILLS_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolved session file, or `None` when persistence is off.
    pub fn session_path(&self) -> Option<PathBuf> {
        if self.no_persist {
            return None;
        }
        self.session_file
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("devbills").join("session.json")))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("devbills")
                .join("devbills.log")
        })
    }
}
