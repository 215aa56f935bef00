// Process-wide installation
// Optional adapter for hosts that want one ambient authenticated fetcher

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::error::{FetchError, Result};
use crate::interceptor::{AuthInterceptor, AuthRequest};

static INSTALLED: OnceCell<Arc<AuthInterceptor>> = OnceCell::new();

/// Install `interceptor` as the process-wide fetcher.
///
/// Idempotent: once something is installed, later calls leave it in place and
/// return the installed instance, so the transport is never wrapped twice.
pub fn install(interceptor: Arc<AuthInterceptor>) -> Arc<AuthInterceptor> {
    let mut fresh = false;
    let installed = INSTALLED.get_or_init(|| {
        fresh = true;
        interceptor.clone()
    });

    if fresh {
        tracing::debug!("Authenticated fetch installed");
    } else if Arc::ptr_eq(installed, &interceptor) {
        tracing::debug!("Authenticated fetch already installed");
    } else {
        tracing::warn!("Authenticated fetch already installed, keeping the existing one");
    }

    installed.clone()
}

/// The installed fetcher, if any
pub fn installed() -> Option<Arc<AuthInterceptor>> {
    INSTALLED.get().cloned()
}

/// Send through the installed fetcher
pub async fn fetch(request: AuthRequest) -> Result<reqwest::Response> {
    let interceptor = installed().ok_or_else(|| {
        FetchError::InvalidRequest("no authenticated fetch installed".to_string())
    })?;
    interceptor.fetch(request).await
}
