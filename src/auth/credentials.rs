// Credential holder
// Single in-process slot for the current access token

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to zero-or-one access token.
///
/// Clones share the same slot, so the refresh coordinator and the dispatcher
/// observe each other's writes. Independent holders are fully isolated.
#[derive(Clone, Default)]
pub struct CredentialHolder {
    access_token: Arc<RwLock<Option<String>>>,
}

impl CredentialHolder {
    /// Create an empty holder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a holder seeded with an initial token (empty strings are ignored)
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            access_token: Arc::new(RwLock::new(non_empty(Some(token)))),
        }
    }

    /// Store `token` if it is a non-empty string, otherwise clear the slot
    pub async fn set(&self, token: Option<String>) {
        let mut slot = self.access_token.write().await;
        *slot = non_empty(token);
    }

    /// Current token, if any
    pub async fn get(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    pub async fn clear(&self) {
        let mut slot = self.access_token.write().await;
        *slot = None;
    }

    pub async fn is_present(&self) -> bool {
        self.access_token.read().await.is_some()
    }
}

impl std::fmt::Debug for CredentialHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself
        f.debug_struct("CredentialHolder").finish_non_exhaustive()
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

/// Short, log-safe prefix of a token
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}...", prefix)
}
