use anyhow::{Context, Result};
use reqwest::{Client, Method, Response, Url};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialHolder;
use crate::config::Config;
use crate::error::FetchError;
use crate::interceptor::{AuthInterceptor, AuthRequest};
use crate::redirect::{LogRedirect, LoginRedirect};

/// Pooled reqwest client wrapped in the authenticated fetch pipeline
pub struct AuthHttpClient {
    /// Shared HTTP client with connection pooling and a cookie store
    client: Client,

    interceptor: Arc<AuthInterceptor>,

    base_url: Url,
}

impl AuthHttpClient {
    /// Create a client that logs login redirects
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_redirect(config, Arc::new(LogRedirect))
    }

    /// Create a client with a custom login redirect sink
    pub fn with_redirect(config: &Config, redirect: Arc<dyn LoginRedirect>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.http_max_connections)
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            // refresh is authenticated by cookies the server set earlier
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = config.base()?;
        let holder = match &config.access_token {
            Some(token) => CredentialHolder::with_token(token.clone()),
            None => CredentialHolder::new(),
        };

        let interceptor = AuthInterceptor::new(
            Arc::new(client.clone()),
            holder,
            config.refresh_url()?,
            redirect,
        )
        .with_login_path(config.login_path.clone());

        Ok(Self {
            client,
            interceptor: Arc::new(interceptor),
            base_url,
        })
    }

    /// Start a request; `path` may be relative to the base URL or absolute
    pub fn request(&self, method: Method, path: &str) -> crate::error::Result<AuthRequest> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::InvalidRequest(format!("{}: {}", path, e)))?;
        Ok(AuthRequest::new(method, url))
    }

    pub fn get(&self, path: &str) -> crate::error::Result<AuthRequest> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> crate::error::Result<AuthRequest> {
        self.request(Method::POST, path)
    }

    pub async fn fetch(&self, request: AuthRequest) -> crate::error::Result<Response> {
        self.interceptor.fetch(request).await
    }

    pub fn interceptor(&self) -> &Arc<AuthInterceptor> {
        &self.interceptor
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
