use anyhow::{Context, Result};
use reqwest::Method;
use std::sync::Arc;

use auth_fetch::config::{self, Config, LogFormat};
use auth_fetch::{install, AuthHttpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, args) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    tracing::debug!(base_url = %config.base_url, "Configuration loaded");

    let client = AuthHttpClient::with_redirect(
        &config,
        Arc::new(|path: &str| eprintln!("[LOGIN REQUIRED] redirect to {}", path)),
    )?;
    install(client.interceptor().clone());
    tracing::debug!("HTTP client initialized with connection pooling");

    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let mut request = client.request(method, &args.path)?.skip_auth(args.skip_auth);
    for raw in &args.headers {
        let (name, value) = config::parse_header_arg(raw)?;
        request = request.try_header(&name, &value)?;
    }
    if let Some(data) = args.data {
        request = request.body(data);
    }

    let response = client.fetch(request).await?;
    let status = response.status();
    let body = response.text().await.context("Failed to read response body")?;

    eprintln!("HTTP {}", status);
    println!("{}", body);

    if !status.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
