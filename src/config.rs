use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;

use crate::auth::REFRESH_PATH;
use crate::redirect::LOGIN_REDIRECT_PATH;

/// auth-fetch - bearer-authenticated HTTP requests with automatic token refresh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// HTTP method
    #[arg(default_value = "GET")]
    pub method: String,

    /// Path (or absolute URL) to request
    #[arg(default_value = "/")]
    pub path: String,

    /// Origin the refresh endpoint and relative paths resolve against
    #[arg(short = 'b', long, env = "AUTH_BASE_URL")]
    pub base_url: Option<String>,

    /// Initial access token
    #[arg(short = 't', long, env = "AUTH_ACCESS_TOKEN")]
    pub token: Option<String>,

    /// Refresh endpoint path
    #[arg(long, env = "AUTH_REFRESH_PATH", default_value = REFRESH_PATH)]
    pub refresh_path: String,

    /// Login redirect path
    #[arg(long, env = "AUTH_LOGIN_PATH", default_value = LOGIN_REDIRECT_PATH)]
    pub login_path: String,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// Send without credentials and without refresh/retry
    #[arg(long)]
    pub skip_auth: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "300")]
    pub http_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Endpoints
    pub base_url: String,
    pub refresh_path: String,
    pub login_path: String,

    // Authentication
    pub access_token: Option<String>,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            refresh_path: REFRESH_PATH.to_string(),
            login_path: LOGIN_REDIRECT_PATH.to_string(),
            access_token: None,
            http_max_connections: 20,
            http_connect_timeout: 30,
            http_request_timeout: 300,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, CliArgs)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args)?;
        Ok((config, args))
    }

    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = Config {
            base_url: args
                .base_url
                .clone()
                .context("AUTH_BASE_URL is required (use -b or set AUTH_BASE_URL env var)")?,

            refresh_path: args.refresh_path.clone(),
            login_path: args.login_path.clone(),

            access_token: args.token.clone().filter(|t| !t.is_empty()),

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", 20),
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", 30),
            http_request_timeout: args.http_timeout,

            log_level: args.log_level.clone(),
            log_format: parse_log_format(&args.log_format),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = self.base()?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("AUTH_BASE_URL must be http or https: {}", self.base_url);
        }

        for (name, path) in [
            ("AUTH_REFRESH_PATH", &self.refresh_path),
            ("AUTH_LOGIN_PATH", &self.login_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{} must start with '/': {}", name, path);
            }
        }

        Ok(())
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("AUTH_BASE_URL is not a valid URL: {}", self.base_url))
    }

    /// Absolute refresh endpoint URL
    pub fn refresh_url(&self) -> Result<Url> {
        self.base()?
            .join(&self.refresh_path)
            .with_context(|| format!("Invalid refresh path: {}", self.refresh_path))
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

/// Split a "Name: value" header argument
pub fn parse_header_arg(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Header must look like 'Name: value': {}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Header name is empty: {}", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}
