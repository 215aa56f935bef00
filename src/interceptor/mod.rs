// Authenticated fetch pipeline
// 401 handling: one shared refresh, one retry, login redirect on terminal failure

mod dispatch;

use reqwest::{Response, StatusCode, Url};
use std::sync::Arc;

use crate::auth::{CredentialHolder, RefreshCoordinator};
use crate::error::{RefreshError, Result};
use crate::redirect::{LoginRedirect, LOGIN_REDIRECT_PATH};
use crate::transport::Transport;

pub use dispatch::{AuthRequest, Dispatcher};

/// Wraps a transport with bearer injection and 401 recovery
pub struct AuthInterceptor {
    dispatcher: Dispatcher,

    coordinator: RefreshCoordinator,

    holder: CredentialHolder,

    redirect: Arc<dyn LoginRedirect>,

    login_path: String,
}

impl AuthInterceptor {
    /// Build the pipeline over `transport`.
    ///
    /// The refresh request goes to `refresh_url` through the same raw
    /// transport, never through this interceptor.
    pub fn new(
        transport: Arc<dyn Transport>,
        holder: CredentialHolder,
        refresh_url: Url,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport.clone(), holder.clone()),
            coordinator: RefreshCoordinator::new(transport, holder.clone(), refresh_url),
            holder,
            redirect,
            login_path: LOGIN_REDIRECT_PATH.to_string(),
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn credentials(&self) -> &CredentialHolder {
        &self.holder
    }

    /// Send `request`, recovering once from a 401.
    ///
    /// - non-401 responses (and every response of a `skip_auth` call) are
    ///   returned as-is
    /// - a failed refresh redirects to login and surfaces the refresh error
    /// - a 401 after the retry redirects to login but is still returned
    pub async fn fetch(&self, request: AuthRequest) -> Result<Response> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

        let response = self.dispatcher.dispatch(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || request.is_skip_auth() {
            return Ok(response);
        }

        tracing::warn!(
            request_id = %request_id,
            method = %request.method(),
            url = %request.url(),
            "Received 401, refreshing access token"
        );

        if let Err(e) = self.coordinator.refresh().await {
            tracing::error!(request_id = %request_id, error = %e, "Cannot recover from 401");
            self.redirect_to_login().await;
            return Err(e.into());
        }

        if !self.holder.is_present().await {
            // Refresh settled fine but the token is already gone; hand back the
            // first attempt's response.
            tracing::warn!(request_id = %request_id, "No access token after refresh");
            self.redirect_to_login().await;
            return Ok(response);
        }

        let retried = self.dispatcher.dispatch(&request).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                request_id = %request_id,
                url = %request.url(),
                "Still unauthorized after token refresh"
            );
            self.redirect_to_login().await;
        } else {
            tracing::debug!(request_id = %request_id, status = %retried.status(), "Retry after refresh completed");
        }

        Ok(retried)
    }

    pub async fn set_access_token(&self, token: Option<String>) {
        self.holder.set(token).await;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.holder.get().await
    }

    pub async fn clear_access_token(&self) {
        self.holder.clear().await;
    }

    /// Trigger a refresh by hand; joins one already in flight
    pub async fn refresh_access_token(&self) -> std::result::Result<String, RefreshError> {
        self.coordinator.refresh().await
    }

    async fn redirect_to_login(&self) {
        self.holder.clear().await;
        self.redirect.redirect(&self.login_path);
    }
}
